pub mod files {
    pub const DATA_PATH: &str = "data";
    pub const TRAINING_PATH: &str = "training";
    pub const TRAIN_FILE: &str = "processed_train_data.csv";
    pub const TEST_FILE: &str = "processed_test_data.csv";
    pub const CHART_IMAGE_FORMAT: &str = "png";
}

pub mod data {
    /// Share of rows, counted from the start of the series, that go to the training split
    pub const TRAIN_RATIO: f64 = 0.8;
    pub const DAYS_PER_YEAR: f64 = 365.0;
    pub const MONTHS_PER_YEAR: f64 = 12.0;
}

pub mod env {
    pub const INITIAL_PORTFOLIO_VALUE: f64 = 10_000.;
    /// Rows behind the current index averaged into the price moving average
    pub const LOOK_BACK_DAYS: usize = 30;
    pub const TRADING_DAYS_PER_YEAR: f64 = 252.;
}

pub mod agent {
    /// How much we care about future rewards
    pub const GAMMA: f64 = 0.99;
    pub const LEARNING_RATE: f64 = 1e-3;
    pub const HIDDEN_LAYERS: [usize; 2] = [64, 64];
    pub const ADAM_BETA1: f64 = 0.9;
    pub const ADAM_BETA2: f64 = 0.999;
    pub const ADAM_EPS: f64 = 1e-8;
}

pub mod training {
    pub const EPISODES: usize = 1000;
    pub const EPSILON_START: f64 = 1.0;
    /// Multiplied into epsilon after every episode, so that the agent chooses less random actions over time
    pub const EPSILON_DECAY: f64 = 0.995;
    pub const LOG_INTERVAL: usize = 100;
    pub const BUFFER_CAPACITY: usize = 10_000;
    pub const BATCH_SIZE: usize = 32;
}
