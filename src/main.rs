use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::{rngs::StdRng, SeedableRng};
use savings_rl::{
    agent::{AgentConfig, DqnAgent, UpdateMode},
    constants::{
        agent::LEARNING_RATE,
        data::TRAIN_RATIO,
        env::{INITIAL_PORTFOLIO_VALUE, LOOK_BACK_DAYS},
        files::{DATA_PATH, TRAINING_PATH},
        training::{BATCH_SIZE, BUFFER_CAPACITY, EPISODES, EPSILON_DECAY, LOG_INTERVAL},
    },
    data::{load_series, prepare::prepare_files},
    gym::{EnvConfig, StartMode, TradingEnv},
    train::{evaluate, train, TrainConfig},
    utils::create_folder_if_not_exists,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "savings_rl")]
#[command(about = "Savings versus stock allocation with a Q-learning agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Joins raw prices with savings rates and writes the train and test splits
    Prepare {
        #[arg(long)]
        stock: PathBuf,

        #[arg(long)]
        rates: PathBuf,

        #[arg(short, long, default_value = DATA_PATH)]
        out_dir: PathBuf,

        #[arg(long, default_value_t = TRAIN_RATIO)]
        train_ratio: f64,
    },
    Train {
        #[arg(short, long, default_value = "data/processed_train_data.csv")]
        data: PathBuf,

        /// Held out series for a greedy evaluation episode after training
        #[arg(long)]
        eval_data: Option<PathBuf>,

        #[arg(short, long, default_value_t = EPISODES)]
        episodes: usize,

        #[arg(long, default_value_t = LOOK_BACK_DAYS)]
        look_back: usize,

        #[arg(long, default_value_t = INITIAL_PORTFOLIO_VALUE)]
        initial_value: f64,

        #[arg(long, default_value_t = LEARNING_RATE)]
        learning_rate: f64,

        #[arg(long, value_enum, default_value_t = UpdateMode::Online)]
        mode: UpdateMode,

        #[arg(long, default_value_t = BUFFER_CAPACITY)]
        buffer_capacity: usize,

        #[arg(long, default_value_t = BATCH_SIZE)]
        batch_size: usize,

        #[arg(long, default_value_t = EPSILON_DECAY)]
        epsilon_decay: f64,

        #[arg(long, value_enum, default_value_t = StartMode::Random)]
        start_mode: StartMode,

        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = LOG_INTERVAL)]
        log_interval: usize,
    },
}

/// Everything a run was configured with, written next to its charts
#[derive(Serialize)]
struct RunConfig<'a> {
    seed: Option<u64>,
    env: &'a EnvConfig,
    agent: &'a AgentConfig,
    train: &'a TrainConfig,
}

fn main() -> anyhow::Result<()> {
    println!("{}", "Start".green());

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            stock,
            rates,
            out_dir,
            train_ratio,
        } => {
            let split = prepare_files(&stock, &rates, &out_dir, train_ratio)
                .context("data preparation failed")?;
            println!(
                "wrote {} training and {} test rows to {}",
                split.train.len(),
                split.test.len(),
                out_dir.display()
            );
        }
        Commands::Train {
            data,
            eval_data,
            episodes,
            look_back,
            initial_value,
            learning_rate,
            mode,
            buffer_capacity,
            batch_size,
            epsilon_decay,
            start_mode,
            seed,
            log_interval,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let env_config = EnvConfig {
                initial_portfolio_value: initial_value,
                look_back_days: look_back,
                start_mode,
            };
            let agent_config = AgentConfig {
                learning_rate,
                mode,
                buffer_capacity,
                batch_size,
                ..AgentConfig::default()
            };
            let train_config = TrainConfig {
                episodes,
                epsilon_decay,
                log_interval,
                ..TrainConfig::default()
            };

            let rows = load_series(&data)
                .with_context(|| format!("unable to load {}", data.display()))?;
            println!("loaded {} rows from {}", rows.len(), data.display());

            let mut env = TradingEnv::new(rows, env_config.clone())?;
            let mut agent = DqnAgent::new(&agent_config, &mut rng)?;

            let run_dir = PathBuf::from(TRAINING_PATH).join(Uuid::new_v4().to_string());
            create_folder_if_not_exists(&run_dir)?;
            let run_config = RunConfig {
                seed,
                env: &env_config,
                agent: &agent_config,
                train: &train_config,
            };
            fs::write(run_dir.join("config.bin"), postcard::to_allocvec(&run_config)?)?;
            println!("run directory {}", run_dir.display());

            let report = train(&mut agent, &mut env, &train_config, &mut rng, Some(&run_dir))?;
            println!(
                "trained {} episodes, final epsilon {:.4}",
                report.episodes, report.final_epsilon
            );
            if let Some(last) = &report.last {
                println!("last episode: {}", last.log);
            }

            if let Some(eval_data) = eval_data {
                let rows = load_series(&eval_data)
                    .with_context(|| format!("unable to load {}", eval_data.display()))?;
                let eval_config = EnvConfig {
                    start_mode: StartMode::Fixed,
                    ..env_config
                };
                let mut eval_env = TradingEnv::new(rows, eval_config)?;

                let log = evaluate(&agent, &mut eval_env, &mut rng)?;
                println!("{} {log}", "evaluation:".blue());
            }
        }
    }

    println!("{}", "End".green());
    Ok(())
}
