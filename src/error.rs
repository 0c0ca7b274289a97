use thiserror::Error;

use crate::gym::EnvPhase;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("invalid action code {0}, expected 0 (savings) or 1 (stock)")]
    InvalidAction(u32),

    #[error("observation has {got} features but the estimator expects {expected}")]
    ObservationWidth { expected: usize, got: usize },

    #[error("environment is {0:?}, call reset() before step()")]
    NotRunning(EnvPhase),

    #[error("series of {len} rows is too short, at least {required} are needed")]
    SeriesTooShort { len: usize, required: usize },

    #[error("adjusted close on {date} is {price}, prices must be finite and positive")]
    InvalidPrice { date: String, price: f64 },

    #[error("column {column} still has a missing value on {date} after forward fill")]
    MissingValues { column: &'static str, date: String },

    #[error("cannot train on an empty batch")]
    EmptyBatch,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Postcard(#[from] postcard::Error),
}
