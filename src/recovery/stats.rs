use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::errors::ErrorCategory;

use super::strategy::RecoveryStrategy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyCounts {
    pub attempts: u64,
    pub successes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyStats {
    pub category: ErrorCategory,
    pub strategy: RecoveryStrategy,
    pub attempts: u64,
    pub successes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: ErrorCategory,
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStatsSnapshot {
    pub strategies: Vec<StrategyStats>,
    pub categories: Vec<CategoryStats>,
}

/// In-memory success/failure counts per (category, strategy).
#[derive(Clone, Default)]
pub struct RecoveryStats {
    inner: Arc<Mutex<BTreeMap<(ErrorCategory, RecoveryStrategy), StrategyCounts>>>,
}

impl RecoveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(
        &self,
        category: ErrorCategory,
        strategy: RecoveryStrategy,
        succeeded: bool,
    ) {
        let mut counts = self.inner.lock().await;
        let entry = counts.entry((category, strategy)).or_default();
        entry.attempts += 1;
        if succeeded {
            entry.successes += 1;
        }
    }

    pub async fn counts(
        &self,
        category: ErrorCategory,
        strategy: RecoveryStrategy,
    ) -> StrategyCounts {
        self.inner
            .lock()
            .await
            .get(&(category, strategy))
            .copied()
            .unwrap_or_default()
    }

    /// Share of recovery attempts for `category` that succeeded.
    pub async fn success_rate(&self, category: ErrorCategory) -> Option<f64> {
        let counts = self.inner.lock().await;
        let (attempts, successes) = counts
            .iter()
            .filter(|((c, _), _)| *c == category)
            .fold((0u64, 0u64), |(a, s), (_, entry)| {
                (a + entry.attempts, s + entry.successes)
            });
        (attempts > 0).then(|| successes as f64 / attempts as f64)
    }

    pub async fn snapshot(&self) -> RecoveryStatsSnapshot {
        let counts = self.inner.lock().await;

        let strategies = counts
            .iter()
            .map(|((category, strategy), entry)| StrategyStats {
                category: *category,
                strategy: *strategy,
                attempts: entry.attempts,
                successes: entry.successes,
            })
            .collect();

        let mut per_category: BTreeMap<ErrorCategory, StrategyCounts> = BTreeMap::new();
        for ((category, _), entry) in counts.iter() {
            let total = per_category.entry(*category).or_default();
            total.attempts += entry.attempts;
            total.successes += entry.successes;
        }
        let categories = per_category
            .into_iter()
            .map(|(category, total)| CategoryStats {
                category,
                attempts: total.attempts,
                successes: total.successes,
                success_rate: if total.attempts == 0 {
                    0.0
                } else {
                    total.successes as f64 / total.attempts as f64
                },
            })
            .collect();

        RecoveryStatsSnapshot {
            strategies,
            categories,
        }
    }

    pub async fn reset(&self) {
        self.inner.lock().await.clear();
    }
}
