use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        agent::{GAMMA, HIDDEN_LAYERS, LEARNING_RATE},
        training::{BATCH_SIZE, BUFFER_CAPACITY},
    },
    error::{HarnessError, Result},
    gym::{Observation, OBSERVATION_SIZE},
    types::Allocation,
};

pub mod memory;
pub mod network;
pub mod optimizer;

pub use memory::{ReplayMemory, Transition};
pub use network::{td_gradients, Params, QNetwork, TdSample};
pub use optimizer::Adam;

/// How experience reaches the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum UpdateMode {
    /// One update per transition, as it happens
    Online,
    /// Transitions go to the replay memory, updates use random batches from it
    Replay,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub input_dim: usize,
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub mode: UpdateMode,
    pub buffer_capacity: usize,
    pub batch_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            input_dim: OBSERVATION_SIZE,
            hidden_layers: HIDDEN_LAYERS.to_vec(),
            learning_rate: LEARNING_RATE,
            mode: UpdateMode::Online,
            buffer_capacity: BUFFER_CAPACITY,
            batch_size: BATCH_SIZE,
        }
    }
}

impl AgentConfig {
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.input_dim];
        sizes.extend(&self.hidden_layers);
        sizes.push(Allocation::size());
        sizes
    }
}

/// Counters reported alongside the environment diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentStats {
    pub updates: usize,
    pub learning_rate: f64,
    pub buffer_len: Option<usize>,
    pub buffer_capacity: Option<usize>,
    pub last_loss: Option<f64>,
}

/// Q-learning agent over a single value estimator. The same estimator
/// evaluates both the current and the next observation, there is no target network.
pub struct DqnAgent {
    network: QNetwork,
    optimizer: Adam,
    memory: Option<ReplayMemory>,
    mode: UpdateMode,
    batch_size: usize,
    updates: usize,
    last_loss: Option<f64>,
}

impl DqnAgent {
    pub fn new<R: Rng>(config: &AgentConfig, rng: &mut R) -> Result<Self> {
        let network = QNetwork::new(&config.layer_sizes(), rng)?;
        Self::with_network(network, config)
    }

    pub fn with_network(network: QNetwork, config: &AgentConfig) -> Result<Self> {
        if network.output_dim() != Allocation::size() {
            return Err(HarnessError::Config(format!(
                "estimator has {} outputs, one per action ({}) expected",
                network.output_dim(),
                Allocation::size()
            )));
        }

        let memory = match config.mode {
            UpdateMode::Online => None,
            UpdateMode::Replay => {
                if config.buffer_capacity == 0 || config.batch_size == 0 {
                    return Err(HarnessError::Config(
                        "replay needs a positive buffer capacity and batch size".into(),
                    ));
                }
                if config.batch_size > config.buffer_capacity {
                    return Err(HarnessError::Config(format!(
                        "batch size {} exceeds buffer capacity {}",
                        config.batch_size, config.buffer_capacity
                    )));
                }
                Some(ReplayMemory::new(config.buffer_capacity))
            }
        };

        Ok(Self {
            optimizer: Adam::new(network.params(), config.learning_rate),
            network,
            memory,
            mode: config.mode,
            batch_size: config.batch_size,
            updates: 0,
            last_loss: None,
        })
    }

    pub fn q_values(&self, observation: &Observation) -> Result<Array1<f64>> {
        self.network.forward(&observation.to_array1())
    }

    /// Random action with probability `epsilon`, otherwise the action with
    /// the strictly highest estimate, lowest index on ties.
    pub fn choose_action<R: Rng>(
        &self,
        observation: &Observation,
        epsilon: f64,
        rng: &mut R,
    ) -> Result<Allocation> {
        if rng.gen::<f64>() < epsilon {
            return Allocation::from_index(rng.gen_range(0..Allocation::size()));
        }

        let q_values = self.q_values(observation)?;
        Allocation::from_index(greedy_index(&q_values))
    }

    /// One step target `reward + GAMMA * max Q(next)` under the current estimator
    fn td_sample(&self, transition: &Transition) -> Result<TdSample> {
        let next_q = self.q_values(&transition.next_observation)?;
        let max_next = next_q.fold(f64::NEG_INFINITY, |max, &q| max.max(q));

        Ok(TdSample {
            input: transition.observation.to_array1(),
            action: transition.action.index(),
            target: transition.reward + GAMMA * max_next,
        })
    }

    fn update(&mut self, batch: &[TdSample]) -> Result<f64> {
        let (grads, loss) = td_gradients(self.network.params(), batch)?;
        self.optimizer.step(self.network.params_mut(), &grads);

        self.updates += 1;
        self.last_loss = Some(loss);
        Ok(loss)
    }

    /// Single sample update from the transition that just happened. Returns the loss.
    pub fn learn(
        &mut self,
        observation: &Observation,
        action: Allocation,
        reward: f64,
        next_observation: &Observation,
    ) -> Result<f64> {
        let sample = self.td_sample(&Transition {
            observation: *observation,
            action,
            reward,
            next_observation: *next_observation,
        })?;

        self.update(&[sample])
    }

    pub fn store(&mut self, transition: Transition) -> Result<()> {
        match &mut self.memory {
            Some(memory) => {
                memory.push(transition);
                Ok(())
            }
            None => Err(HarnessError::Config(
                "agent was built for online updates and has no replay memory".into(),
            )),
        }
    }

    /// Batched update from the replay memory, `None` until it holds a full batch
    pub fn learn_replay<R: Rng>(&mut self, rng: &mut R) -> Result<Option<f64>> {
        let Some(memory) = &self.memory else {
            return Ok(None);
        };
        let Some(transitions) = memory.sample(rng, self.batch_size) else {
            return Ok(None);
        };

        let batch = transitions
            .iter()
            .map(|transition| self.td_sample(transition))
            .collect::<Result<Vec<_>>>()?;

        self.update(&batch).map(Some)
    }

    /// Feeds a transition through whichever update mode the agent was built with
    pub fn observe<R: Rng>(&mut self, transition: Transition, rng: &mut R) -> Result<Option<f64>> {
        match self.mode {
            UpdateMode::Online => self
                .learn(
                    &transition.observation,
                    transition.action,
                    transition.reward,
                    &transition.next_observation,
                )
                .map(Some),
            UpdateMode::Replay => {
                self.store(transition)?;
                self.learn_replay(rng)
            }
        }
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            updates: self.updates,
            learning_rate: self.optimizer.learning_rate(),
            buffer_len: self.memory.as_ref().map(ReplayMemory::len),
            buffer_capacity: self.memory.as_ref().map(ReplayMemory::capacity),
            last_loss: self.last_loss,
        }
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn network(&self) -> &QNetwork {
        &self.network
    }

    pub fn memory(&self) -> Option<&ReplayMemory> {
        self.memory.as_ref()
    }
}

fn greedy_index(q_values: &Array1<f64>) -> usize {
    let mut best = 0;
    for (index, value) in q_values.iter().enumerate().skip(1) {
        if *value > q_values[best] {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::agent::network::Dense;

    fn observation(adj_close: f64) -> Observation {
        Observation {
            quarter: 2.,
            adj_close,
            adj_close_ma: adj_close,
        }
    }

    /// Estimator that ignores its input and returns `values`
    fn constant_network(values: [f64; 2]) -> QNetwork {
        QNetwork::from_params(Params {
            layers: vec![Dense {
                weights: Array2::zeros((OBSERVATION_SIZE, 2)),
                biases: Array1::from(values.to_vec()),
            }],
        })
    }

    fn replay_config(buffer_capacity: usize, batch_size: usize) -> AgentConfig {
        AgentConfig {
            mode: UpdateMode::Replay,
            buffer_capacity,
            batch_size,
            ..AgentConfig::default()
        }
    }

    #[test]
    fn greedy_picks_the_dominating_action() {
        let mut rng = StdRng::seed_from_u64(0);

        let agent = DqnAgent::with_network(constant_network([0.5, 2.]), &AgentConfig::default()).unwrap();
        for _ in 0..100 {
            assert_eq!(agent.choose_action(&observation(10.), 0., &mut rng).unwrap(), Allocation::Stock);
        }

        let agent = DqnAgent::with_network(constant_network([3., -1.]), &AgentConfig::default()).unwrap();
        for _ in 0..100 {
            assert_eq!(agent.choose_action(&observation(10.), 0., &mut rng).unwrap(), Allocation::Savings);
        }
    }

    #[test]
    fn ties_break_to_the_lowest_action() {
        let mut rng = StdRng::seed_from_u64(0);
        let agent = DqnAgent::with_network(constant_network([1., 1.]), &AgentConfig::default()).unwrap();

        assert_eq!(agent.choose_action(&observation(10.), 0., &mut rng).unwrap(), Allocation::Savings);
    }

    #[test]
    fn full_exploration_picks_both_actions() {
        let mut rng = StdRng::seed_from_u64(4);
        let agent = DqnAgent::with_network(constant_network([0., 5.]), &AgentConfig::default()).unwrap();

        let savings = (0..1_000)
            .filter(|_| agent.choose_action(&observation(10.), 1., &mut rng).unwrap() == Allocation::Savings)
            .count();
        assert!((350..650).contains(&savings), "{savings}");
    }

    #[test]
    fn online_learning_moves_the_estimate_toward_the_target() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut agent = DqnAgent::new(&AgentConfig::default(), &mut rng).unwrap();

        let current = observation(1.);
        let next = observation(1.5);

        let before = agent.q_values(&current).unwrap()[1];
        let max_next = agent.q_values(&next).unwrap().fold(f64::NEG_INFINITY, |max, &q| max.max(q));
        let target = 1. + GAMMA * max_next;

        let loss = agent.learn(&current, Allocation::Stock, 1., &next).unwrap();
        assert!((loss - (before - target).powi(2)).abs() < 1e-9);

        let after = agent.q_values(&current).unwrap()[1];
        assert!((after - target).abs() < (before - target).abs(), "{before} -> {after}, target {target}");

        let stats = agent.stats();
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.last_loss, Some(loss));
        assert_eq!(stats.buffer_len, None);
        assert_eq!(stats.learning_rate, LEARNING_RATE);
    }

    #[test]
    fn target_uses_discounted_best_next_estimate() {
        let agent = DqnAgent::with_network(constant_network([2., 4.]), &AgentConfig::default()).unwrap();
        let sample = agent
            .td_sample(&Transition {
                observation: observation(1.),
                action: Allocation::Savings,
                reward: 0.5,
                next_observation: observation(2.),
            })
            .unwrap();

        assert_eq!(sample.action, 0);
        assert!((sample.target - (0.5 + 0.99 * 4.)).abs() < 1e-12);
    }

    #[test]
    fn replay_is_a_no_op_until_a_batch_is_stored() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut agent = DqnAgent::new(&replay_config(16, 4), &mut rng).unwrap();

        let transition = Transition {
            observation: observation(1.),
            action: Allocation::Savings,
            reward: 0.1,
            next_observation: observation(1.1),
        };

        for _ in 0..3 {
            assert_eq!(agent.observe(transition, &mut rng).unwrap(), None);
        }
        assert_eq!(agent.stats().updates, 0);

        assert!(agent.observe(transition, &mut rng).unwrap().is_some());
        let stats = agent.stats();
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.buffer_len, Some(4));
        assert_eq!(stats.buffer_capacity, Some(16));

        for _ in 0..30 {
            agent.observe(transition, &mut rng).unwrap();
        }
        assert_eq!(agent.stats().buffer_len, Some(16));
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let mut rng = StdRng::seed_from_u64(2);

        assert!(DqnAgent::new(&replay_config(4, 8), &mut rng).is_err());
        assert!(DqnAgent::new(&replay_config(0, 0), &mut rng).is_err());

        let three_outputs = QNetwork::new(&[OBSERVATION_SIZE, 4, 3], &mut rng).unwrap();
        assert!(DqnAgent::with_network(three_outputs, &AgentConfig::default()).is_err());
    }

    #[test]
    fn mismatched_input_width_is_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = AgentConfig {
            input_dim: 5,
            ..AgentConfig::default()
        };
        let agent = DqnAgent::new(&config, &mut rng).unwrap();

        let err = agent.choose_action(&observation(1.), 0., &mut rng).unwrap_err();
        assert!(matches!(err, HarnessError::ObservationWidth { expected: 5, got: 3 }));
    }

    #[test]
    fn online_agent_has_no_memory_to_store_into() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut agent = DqnAgent::new(&AgentConfig::default(), &mut rng).unwrap();

        let transition = Transition {
            observation: observation(1.),
            action: Allocation::Stock,
            reward: 0.,
            next_observation: observation(1.),
        };
        assert!(agent.store(transition).is_err());
        assert_eq!(agent.learn_replay(&mut rng).unwrap(), None);
    }
}
