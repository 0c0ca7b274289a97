pub mod diagnostics;
pub mod env;
pub mod portfolio;
pub mod state;

pub use diagnostics::{annualized_return, StepLog};
pub use env::{EnvConfig, EnvPhase, StartMode, Step, TradingEnv};
pub use portfolio::Portfolio;
pub use state::{Observation, State, FEATURES, OBSERVATION_SIZE};
