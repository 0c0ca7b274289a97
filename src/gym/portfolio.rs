use serde::Serialize;

use crate::{constants::env::TRADING_DAYS_PER_YEAR, types::Allocation};

/// Converts an annualized percentage rate into the rate compounded per trading day
pub fn daily_rate(annual_rate_percent: f64) -> f64 {
    (1. + annual_rate_percent / 100.).powf(1. / TRADING_DAYS_PER_YEAR) - 1.
}

/// Fully allocated to exactly one asset class: cash when in savings, stock
/// units otherwise. Prices are expected to be positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Portfolio {
    pub cash: f64,
    pub quantity: f64,
    pub holding: Allocation,
}

impl Portfolio {
    pub fn new(initial_value: f64) -> Self {
        Self {
            cash: initial_value,
            quantity: 0.,
            holding: Allocation::Savings,
        }
    }

    pub fn value(&self, price: f64) -> f64 {
        if self.quantity == 0. {
            self.cash
        } else {
            self.quantity * price
        }
    }

    pub fn position(&self) -> u8 {
        if self.quantity == 0. {
            0
        } else {
            1
        }
    }

    /// Sells every stock unit into cash at `price`
    pub fn liquidate(&mut self, price: f64) {
        self.cash += self.quantity * price;
        self.quantity = 0.;
    }

    /// Applies one day of the chosen allocation using that day's price and rate
    pub fn apply(&mut self, action: Allocation, price: f64, annual_rate_percent: f64) {
        if self.holding != action {
            self.liquidate(price);
            self.holding = action;
        }

        match action {
            Allocation::Savings => {
                self.cash += self.cash * daily_rate(annual_rate_percent);
            }
            Allocation::Stock => {
                self.quantity += self.cash / price;
                self.cash = 0.;
            }
        }
    }

    pub fn savings_investment(&self) -> f64 {
        match self.holding {
            Allocation::Savings => self.cash,
            Allocation::Stock => 0.,
        }
    }

    pub fn stock_investment(&self, price: f64) -> f64 {
        match self.holding {
            Allocation::Savings => 0.,
            Allocation::Stock => self.quantity * price,
        }
    }
}
