use std::path::Path;

use crate::{
    charts::general::{assets_chart, simple_chart},
    gym::Step,
    types::Allocation,
    utils::{create_folder_if_not_exists, mean},
};

/// Per step series of a single episode.
#[derive(Debug, Default, Clone)]
pub struct EpisodeHistory {
    pub actions: Vec<Allocation>,
    pub rewards: Vec<f64>,
    pub portfolio_values: Vec<f64>,
    pub savings: Vec<f64>,
    pub stock: Vec<f64>,
    pub losses: Vec<f64>,
}

impl EpisodeHistory {
    pub fn record_step(&mut self, action: Allocation, step: &Step) {
        self.actions.push(action);
        self.rewards.push(step.reward);
        self.portfolio_values.push(step.state.portfolio_value);
        self.savings.push(step.log.savings_investment);
        self.stock.push(step.log.stock_investment);
    }

    pub fn record_loss(&mut self, loss: f64) {
        self.losses.push(loss);
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    pub fn mean_loss(&self) -> Option<f64> {
        mean(self.losses.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn chart(&self, dir: &Path) -> anyhow::Result<()> {
        create_folder_if_not_exists(dir)?;

        let positions: Vec<f64> = self
            .actions
            .iter()
            .map(|action| action.index() as f64)
            .collect();

        assets_chart(dir, "assets", &self.savings, &self.stock)?;
        simple_chart(dir, "rewards", &self.rewards)?;
        simple_chart(dir, "positions", &positions)?;
        if !self.losses.is_empty() {
            simple_chart(dir, "losses", &self.losses)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        data::row::synthetic_series,
        gym::{EnvConfig, StartMode, TradingEnv},
    };

    #[test]
    fn steps_are_recorded_in_order() {
        let start = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let rows = synthetic_series(start, &[10., 10., 11., 12., 12.], &[0.; 5]);
        let config = EnvConfig {
            initial_portfolio_value: 1_000.,
            look_back_days: 1,
            start_mode: StartMode::Fixed,
        };
        let mut env = TradingEnv::new(rows, config).unwrap();
        env.reset_at(1).unwrap();

        let mut history = EpisodeHistory::default();
        for action in [Allocation::Stock, Allocation::Stock, Allocation::Savings] {
            let step = env.step(action).unwrap();
            history.record_step(action, &step);
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.actions, vec![Allocation::Stock, Allocation::Stock, Allocation::Savings]);
        assert!((history.total_reward() - 200.).abs() < 1e-9);
        assert!((history.stock[1] - 1_200.).abs() < 1e-9);
        assert_eq!(history.savings[0], 0.);
        assert!((history.savings[2] - 1_200.).abs() < 1e-9);
        assert_eq!(history.mean_loss(), None);

        history.record_loss(2.);
        history.record_loss(4.);
        assert_eq!(history.mean_loss(), Some(3.));
    }
}
