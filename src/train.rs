use std::path::Path;

use colored::Colorize;
use rand::Rng;
use serde::Serialize;

use crate::{
    agent::{AgentStats, DqnAgent, Transition},
    constants::training::{EPISODES, EPSILON_DECAY, EPSILON_START, LOG_INTERVAL},
    error::Result,
    gym::{StepLog, TradingEnv},
    history::{EpisodeHistory, MetaHistory},
};

#[derive(Debug, Clone, Serialize)]
pub struct TrainConfig {
    pub episodes: usize,
    pub epsilon_start: f64,
    /// Multiplied into epsilon after every episode
    pub epsilon_decay: f64,
    /// Report every N episodes, 0 disables the report
    pub log_interval: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: EPISODES,
            epsilon_start: EPSILON_START,
            epsilon_decay: EPSILON_DECAY,
            log_interval: LOG_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    /// Exploration rate the episode ran with
    pub epsilon: f64,
    pub total_reward: f64,
    pub mean_loss: Option<f64>,
    /// Diagnostics of the final step
    pub log: StepLog,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub episodes: usize,
    /// Exploration rate after the last decay
    pub final_epsilon: f64,
    pub last: Option<EpisodeSummary>,
    pub meta: MetaHistory,
}

/// Exploration rate used by episode `episode` under a multiplicative schedule
pub fn epsilon_after(epsilon_start: f64, epsilon_decay: f64, episode: usize) -> f64 {
    epsilon_start * epsilon_decay.powi(episode as i32)
}

/// Drives one episode from `reset` until the environment reports done.
/// Every transition reaches the agent's update rule.
pub fn run_episode<R: Rng>(
    agent: &mut DqnAgent,
    env: &mut TradingEnv,
    epsilon: f64,
    rng: &mut R,
    history: &mut EpisodeHistory,
) -> Result<StepLog> {
    env.reset(rng);

    loop {
        let observation = env.observation();
        let action = agent.choose_action(&observation, epsilon, rng)?;

        let step = env.step(action)?;
        let next_observation = env.observation();
        history.record_step(action, &step);

        // The terminal transition still bootstraps from the next observation
        let transition = Transition {
            observation,
            action,
            reward: step.reward,
            next_observation,
        };
        if let Some(loss) = agent.observe(transition, rng)? {
            history.record_loss(loss);
        }

        if step.done {
            return Ok(step.log);
        }
    }
}

pub fn train<R: Rng>(
    agent: &mut DqnAgent,
    env: &mut TradingEnv,
    config: &TrainConfig,
    rng: &mut R,
    output_dir: Option<&Path>,
) -> Result<TrainingReport> {
    let mut epsilon = config.epsilon_start;
    let mut meta = MetaHistory::default();
    let mut last = None;

    for episode in 0..config.episodes {
        let mut history = EpisodeHistory::default();
        let log = run_episode(agent, env, epsilon, rng, &mut history)?;

        let summary = EpisodeSummary {
            episode,
            epsilon,
            total_reward: history.total_reward(),
            mean_loss: history.mean_loss(),
            log,
        };
        meta.record(&summary);

        if config.log_interval > 0 && episode % config.log_interval == 0 {
            print_summary(&summary, &agent.stats());

            #[cfg(feature = "debug_training")]
            if let Some(dir) = output_dir {
                if let Err(err) = history.chart(&dir.join("episodes").join(episode.to_string())) {
                    println!("{} {err:#}", "unable to chart episode:".yellow());
                }
            }
        }

        epsilon *= config.epsilon_decay;
        last = Some(summary);
    }

    #[cfg(feature = "debug_training")]
    if let Some(dir) = output_dir {
        if !meta.is_empty() {
            if let Err(err) = meta.chart(dir) {
                println!("{} {err:#}", "unable to chart training run:".yellow());
            }
        }
    }
    #[cfg(not(feature = "debug_training"))]
    let _ = output_dir;

    Ok(TrainingReport {
        episodes: config.episodes,
        final_epsilon: epsilon,
        last,
        meta,
    })
}

/// One greedy episode without any updates. Runs from wherever `reset` places
/// the environment, so evaluate with a fixed start to cover the whole series.
pub fn evaluate<R: Rng>(agent: &DqnAgent, env: &mut TradingEnv, rng: &mut R) -> Result<StepLog> {
    env.reset(rng);

    loop {
        let action = agent.choose_action(&env.observation(), 0., rng)?;
        let step = env.step(action)?;

        if step.done {
            return Ok(step.log);
        }
    }
}

fn print_summary(summary: &EpisodeSummary, stats: &AgentStats) {
    let buffer = match (stats.buffer_len, stats.buffer_capacity) {
        (Some(len), Some(capacity)) => format!("{len}/{capacity}"),
        _ => "-".to_string(),
    };
    let loss = summary
        .mean_loss
        .map_or_else(|| "-".to_string(), |loss| format!("{loss:.4}"));

    println!(
        "{} {} | epsilon {:.4} | final value {:.2} | total reward {:.2}",
        "episode".cyan(),
        summary.episode,
        summary.epsilon,
        summary.log.portfolio_value,
        summary.total_reward,
    );
    println!("    {}", summary.log);
    println!(
        "    updates {} | learning rate {} | buffer {buffer} | mean loss {loss}",
        stats.updates, stats.learning_rate,
    );
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        agent::{AgentConfig, UpdateMode},
        data::row::synthetic_series,
        gym::{EnvConfig, StartMode},
        types::Allocation,
    };

    fn env(start_mode: StartMode) -> TradingEnv {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let prices: Vec<f64> = (0..40).map(|day| 50. + (day as f64 * 0.7).sin() * 5.).collect();
        let rows = synthetic_series(start, &prices, &vec![2.; prices.len()]);

        let config = EnvConfig {
            initial_portfolio_value: 10_000.,
            look_back_days: 5,
            start_mode,
        };
        TradingEnv::new(rows, config).unwrap()
    }

    fn config(episodes: usize) -> TrainConfig {
        TrainConfig {
            episodes,
            log_interval: 0,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn epsilon_decays_once_per_episode() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut agent = DqnAgent::new(&AgentConfig::default(), &mut rng).unwrap();
        let mut env = env(StartMode::Random);

        let report = train(&mut agent, &mut env, &config(5), &mut rng, None).unwrap();

        assert_eq!(report.episodes, 5);
        assert_eq!(report.meta.len(), 5);
        for (episode, epsilon) in report.meta.epsilons.iter().enumerate() {
            assert!((epsilon - 0.995f64.powi(episode as i32)).abs() < 1e-12);
        }
        assert!((report.final_epsilon - epsilon_after(1., 0.995, 5)).abs() < 1e-12);
        assert_eq!(report.last.unwrap().episode, 4);
    }

    #[test]
    fn online_mode_updates_on_every_step() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut agent = DqnAgent::new(&AgentConfig::default(), &mut rng).unwrap();
        let mut env = env(StartMode::Fixed);

        let report = train(&mut agent, &mut env, &config(3), &mut rng, None).unwrap();

        // Fixed starts at index 5 of 40 rows, so 34 steps per episode
        let last = report.last.unwrap();
        assert_eq!(last.log.steps_elapsed, 34);
        assert_eq!(agent.stats().updates, 3 * 34);
        assert!(last.mean_loss.is_some());
        assert_eq!(report.meta.mean_losses.len(), 3);

        let counts = last.log.action_distribution;
        assert_eq!(counts[Allocation::Savings] + counts[Allocation::Stock], 34);
    }

    #[test]
    fn replay_mode_waits_for_a_full_batch() {
        let mut rng = StdRng::seed_from_u64(6);
        let agent_config = AgentConfig {
            mode: UpdateMode::Replay,
            buffer_capacity: 50,
            batch_size: 40,
            ..AgentConfig::default()
        };
        let mut agent = DqnAgent::new(&agent_config, &mut rng).unwrap();
        let mut env = env(StartMode::Fixed);

        let report = train(&mut agent, &mut env, &config(2), &mut rng, None).unwrap();

        // 68 stored transitions, updates start with the 40th
        let stats = agent.stats();
        assert_eq!(stats.updates, 68 - 40 + 1);
        assert_eq!(stats.buffer_len, Some(50));
        assert_eq!(report.meta.mean_losses.len(), 1);
    }

    #[test]
    fn evaluation_is_greedy_and_leaves_the_agent_untouched() {
        let mut rng = StdRng::seed_from_u64(9);
        let agent = DqnAgent::new(&AgentConfig::default(), &mut rng).unwrap();
        let params = agent.network().params().clone();
        let mut env = env(StartMode::Fixed);

        let first = evaluate(&agent, &mut env, &mut rng).unwrap();
        let second = evaluate(&agent, &mut env, &mut rng).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.steps_elapsed, 34);
        assert_eq!(agent.stats().updates, 0);
        assert_eq!(agent.network().params(), &params);
    }
}
