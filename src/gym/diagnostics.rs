use std::fmt;

use serde::Serialize;

use crate::{
    constants::env::TRADING_DAYS_PER_YEAR,
    types::{ActionCounts, Allocation},
};

/// Per step diagnostics reported by the environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepLog {
    pub steps_elapsed: usize,
    pub action_distribution: ActionCounts,
    pub portfolio_value: f64,
    pub savings_investment: f64,
    pub stock_investment: f64,
    pub initial_investment: f64,
    pub annualized_return: f64,
}

impl fmt::Display for StepLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "steps {} | actions {}: {}, {}: {} | value {:.2} (initial {:.2}) | savings {:.2} stock {:.2} | annualized {:.2}%",
            self.steps_elapsed,
            Allocation::Savings.label(),
            self.action_distribution[Allocation::Savings],
            Allocation::Stock.label(),
            self.action_distribution[Allocation::Stock],
            self.portfolio_value,
            self.initial_investment,
            self.savings_investment,
            self.stock_investment,
            self.annualized_return * 100.,
        )
    }
}

/// Annualized internal rate of return of investing `initial_value` and
/// holding `current_value` after `steps_elapsed` trading days.
///
/// With the two cash flows `-initial, +current` the only real root is
/// `current / initial - 1`. Returns 0 when the rate is not computable.
pub fn annualized_return(initial_value: f64, current_value: f64, steps_elapsed: usize) -> f64 {
    if steps_elapsed == 0 || initial_value <= 0. || current_value <= 0. {
        return 0.;
    }

    let irr = current_value / initial_value - 1.;
    let annualization_factor = TRADING_DAYS_PER_YEAR / steps_elapsed as f64;
    let annualized = (1. + irr).powf(annualization_factor) - 1.;

    if annualized.is_finite() {
        annualized
    } else {
        0.
    }
}
