use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    constants::env::{INITIAL_PORTFOLIO_VALUE, LOOK_BACK_DAYS},
    data::Row,
    error::{HarnessError, Result},
    gym::{
        diagnostics::{annualized_return, StepLog},
        portfolio::Portfolio,
        state::{Observation, State, FEATURES, OBSERVATION_SIZE},
    },
    types::{ActionCounts, Allocation},
    utils::moving_average,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvPhase {
    Initialized,
    Running,
    Terminated,
}

/// Where `reset` places the first step of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum StartMode {
    /// Always at the look back offset
    Fixed,
    /// Uniformly within `look_back .. len - look_back`
    Random,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvConfig {
    pub initial_portfolio_value: f64,
    pub look_back_days: usize,
    pub start_mode: StartMode,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            initial_portfolio_value: INITIAL_PORTFOLIO_VALUE,
            look_back_days: LOOK_BACK_DAYS,
            start_mode: StartMode::Random,
        }
    }
}

/// Outcome of one call to [`TradingEnv::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: State,
    pub reward: f64,
    pub done: bool,
    pub log: StepLog,
}

/// Binary allocation between savings and a stock over a fixed price series.
#[derive(Debug, Clone)]
pub struct TradingEnv {
    rows: Vec<Row>,
    config: EnvConfig,
    phase: EnvPhase,
    current_step: usize,
    initial_step: usize,
    steps_elapsed: usize,
    portfolio: Portfolio,
    action_counts: ActionCounts,
}

impl TradingEnv {
    pub fn new(rows: Vec<Row>, config: EnvConfig) -> Result<Self> {
        if config.look_back_days == 0 {
            return Err(HarnessError::Config("look back must be at least one day".into()));
        }
        if config.initial_portfolio_value <= 0. {
            return Err(HarnessError::Config(format!(
                "initial portfolio value {} must be positive",
                config.initial_portfolio_value
            )));
        }

        // Stock purchases divide by the price
        if let Some(row) = rows
            .iter()
            .find(|row| !(row.adj_close.is_finite() && row.adj_close > 0.))
        {
            return Err(HarnessError::InvalidPrice {
                date: row.date.to_string(),
                price: row.adj_close,
            });
        }

        let required = Self::required_rows(&config);
        if rows.len() < required {
            return Err(HarnessError::SeriesTooShort {
                len: rows.len(),
                required,
            });
        }

        Ok(Self {
            rows,
            portfolio: Portfolio::new(config.initial_portfolio_value),
            current_step: config.look_back_days,
            initial_step: config.look_back_days,
            config,
            phase: EnvPhase::Initialized,
            steps_elapsed: 0,
            action_counts: ActionCounts::default(),
        })
    }

    fn required_rows(config: &EnvConfig) -> usize {
        match config.start_mode {
            // A start index and at least one step after it
            StartMode::Fixed => config.look_back_days + 2,
            StartMode::Random => 2 * config.look_back_days + 1,
        }
    }

    /// Indices `reset` may start an episode at
    pub fn start_range(&self) -> Range<usize> {
        let look_back = self.config.look_back_days;
        match self.config.start_mode {
            StartMode::Fixed => look_back..look_back + 1,
            StartMode::Random => look_back..self.rows.len() - look_back,
        }
    }

    pub fn reset<R: Rng>(&mut self, rng: &mut R) -> State {
        let start = rng.gen_range(self.start_range());
        self.start_at(start);
        self.state()
    }

    /// Resets with an explicit start index within `look_back .. len - 1`
    pub fn reset_at(&mut self, start: usize) -> Result<State> {
        let look_back = self.config.look_back_days;
        if start < look_back || start >= self.rows.len() - 1 {
            return Err(HarnessError::Config(format!(
                "start index {start} outside {look_back}..{}",
                self.rows.len() - 1
            )));
        }

        self.start_at(start);
        Ok(self.state())
    }

    fn start_at(&mut self, start: usize) {
        self.portfolio = Portfolio::new(self.config.initial_portfolio_value);
        self.current_step = start;
        self.initial_step = start;
        self.steps_elapsed = 0;
        self.action_counts = ActionCounts::default();
        self.phase = EnvPhase::Running;
    }

    fn row(&self) -> &Row {
        &self.rows[self.current_step]
    }

    pub fn state(&self) -> State {
        let row = *self.row();

        State {
            row,
            position: self.portfolio.position(),
            portfolio_value: self.portfolio.value(row.adj_close),
        }
    }

    pub fn observation(&self) -> Observation {
        let look_back = self.config.look_back_days;
        let window = &self.rows[self.current_step - look_back..self.current_step];
        let prices: Vec<f64> = window.iter().map(|row| row.adj_close).collect();
        let row = self.row();

        Observation {
            quarter: row.quarter as f64,
            adj_close: row.adj_close,
            adj_close_ma: moving_average(&prices),
        }
    }

    /// Applies `action` with the current day's price and rate, then advances one day.
    pub fn step(&mut self, action: Allocation) -> Result<Step> {
        if self.phase != EnvPhase::Running {
            return Err(HarnessError::NotRunning(self.phase));
        }

        let Row {
            adj_close: price,
            savings_rate,
            ..
        } = *self.row();
        let prev_portfolio_value = self.portfolio.value(price);

        self.action_counts[action] += 1;
        self.portfolio.apply(action, price, savings_rate);

        self.current_step += 1;

        // The last row is never reached as a running state
        let done = self.current_step == self.rows.len() - 1;
        if done {
            self.phase = EnvPhase::Terminated;
        }

        let state = self.state();
        let reward = state.portfolio_value - prev_portfolio_value;

        self.steps_elapsed = self.current_step - self.initial_step;
        let initial_value = self.config.initial_portfolio_value;

        let log = StepLog {
            steps_elapsed: self.steps_elapsed,
            action_distribution: self.action_counts,
            portfolio_value: state.portfolio_value,
            savings_investment: self.portfolio.savings_investment(),
            stock_investment: self.portfolio.stock_investment(state.row.adj_close),
            initial_investment: initial_value,
            annualized_return: annualized_return(
                initial_value,
                state.portfolio_value,
                self.steps_elapsed,
            ),
        };

        Ok(Step {
            state,
            reward,
            done,
            log,
        })
    }

    pub fn action_space() -> [Allocation; 2] {
        Allocation::ALL
    }

    pub fn observation_space() -> [&'static str; OBSERVATION_SIZE] {
        FEATURES
    }

    pub fn phase(&self) -> EnvPhase {
        self.phase
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn initial_step(&self) -> usize {
        self.initial_step
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

}
