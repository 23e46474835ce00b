pub mod manager;
pub mod stats;
pub mod strategy;

pub use manager::{RecoveryConfig, RecoveryManager, RecoveryResult, StrategyAttempt};
pub use stats::{CategoryStats, RecoveryStats, RecoveryStatsSnapshot, StrategyCounts, StrategyStats};
pub use strategy::{strategies_for, RecoveryActions, RecoveryContext, RecoveryStrategy};
