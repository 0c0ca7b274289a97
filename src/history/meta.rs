use std::path::Path;

use crate::{
    charts::general::simple_chart,
    train::EpisodeSummary,
    utils::create_folder_if_not_exists,
};

/// One value per episode across a training run.
#[derive(Debug, Default, Clone)]
pub struct MetaHistory {
    pub final_values: Vec<f64>,
    pub total_rewards: Vec<f64>,
    pub annualized_returns: Vec<f64>,
    pub epsilons: Vec<f64>,
    /// Only episodes that ran at least one update
    pub mean_losses: Vec<f64>,
}

impl MetaHistory {
    pub fn record(&mut self, summary: &EpisodeSummary) {
        self.final_values.push(summary.log.portfolio_value);
        self.total_rewards.push(summary.total_reward);
        self.annualized_returns.push(summary.log.annualized_return);
        self.epsilons.push(summary.epsilon);
        if let Some(loss) = summary.mean_loss {
            self.mean_losses.push(loss);
        }
    }

    pub fn len(&self) -> usize {
        self.final_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.final_values.is_empty()
    }

    pub fn chart(&self, dir: &Path) -> anyhow::Result<()> {
        create_folder_if_not_exists(dir)?;

        simple_chart(dir, "final_values", &self.final_values)?;
        simple_chart(dir, "total_rewards", &self.total_rewards)?;
        simple_chart(dir, "annualized_returns", &self.annualized_returns)?;
        simple_chart(dir, "epsilons", &self.epsilons)?;
        if !self.mean_losses.is_empty() {
            simple_chart(dir, "mean_losses", &self.mean_losses)?;
        }

        Ok(())
    }
}
