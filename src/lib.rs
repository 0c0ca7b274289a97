pub mod agent;
pub mod charts;
pub mod constants;
pub mod data;
pub mod error;
pub mod gym;
pub mod history;
pub mod train;
pub mod types;
pub mod utils;
