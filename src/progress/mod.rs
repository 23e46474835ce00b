pub mod calculator;
pub mod config;

pub use calculator::{activity_delta, base_distance, distance_delta, progress};
pub use config::CalculatorConfig;
