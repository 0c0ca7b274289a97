use ndarray::Array1;
use serde::Serialize;

use crate::data::Row;

pub const OBSERVATION_SIZE: usize = 3;

/// Feature order of [`Observation::to_array`], shared by the environment and the agent
pub const FEATURES: [&str; OBSERVATION_SIZE] = ["Quarter", "Adj Close", "Adj_Close_MA"];

/// The full view of the current day plus the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct State {
    pub row: Row,
    /// 0 when nothing is invested in the stock, 1 otherwise
    pub position: u8,
    pub portfolio_value: f64,
}

impl State {
    /// Ordered (feature, value) pairs of the row followed by `position` and `portfolio_value`.
    pub fn features(&self) -> Vec<(&'static str, f64)> {
        let mut features = self.row.numeric_fields().to_vec();
        features.push(("position", self.position as f64));
        features.push(("portfolio_value", self.portfolio_value));
        features
    }
}

/// Reduced view fed to the value estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub quarter: f64,
    pub adj_close: f64,
    /// Mean adjusted close over the look back window before the current day
    pub adj_close_ma: f64,
}

impl Observation {
    pub fn to_array(&self) -> [f64; OBSERVATION_SIZE] {
        [self.quarter, self.adj_close, self.adj_close_ma]
    }

    pub fn to_array1(&self) -> Array1<f64> {
        Array1::from(self.to_array().to_vec())
    }

    pub fn len(&self) -> usize {
        OBSERVATION_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
