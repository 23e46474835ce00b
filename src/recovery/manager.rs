use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::{ClassifiedError, QuestError};
use crate::handling::AttemptLedger;

use super::stats::{RecoveryStats, RecoveryStatsSnapshot};
use super::strategy::{strategies_for, RecoveryActions, RecoveryContext, RecoveryStrategy};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecoveryConfig {
    /// Recovery runs allowed per (category, operation) before giving up.
    pub max_attempts: u32,
    /// Pause before an automatic retry strategy re-runs the operation.
    pub retry_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl RecoveryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Outcome of one strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttempt {
    pub strategy: RecoveryStrategy,
    pub succeeded: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResult {
    pub recovered: bool,
    /// Strategy that fixed the problem.
    pub strategy_used: Option<RecoveryStrategy>,
    pub attempts: Vec<StrategyAttempt>,
    /// Set when the chain ended asking the user to act.
    pub user_instruction: Option<String>,
    /// The per-operation attempt cap was hit; no strategy ran.
    pub exhausted: bool,
}

impl RecoveryResult {
    fn new() -> Self {
        Self {
            recovered: false,
            strategy_used: None,
            attempts: Vec::new(),
            user_instruction: None,
            exhausted: false,
        }
    }
}

/// Runs strategy chains for classified failures and keeps per-operation caps.
#[derive(Clone)]
pub struct RecoveryManager {
    config: RecoveryConfig,
    ledger: Arc<Mutex<AttemptLedger>>,
    stats: RecoveryStats,
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

impl RecoveryManager {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            ledger: Arc::new(Mutex::new(AttemptLedger::new())),
            stats: RecoveryStats::new(),
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn strategies_for(&self, error: &QuestError) -> Vec<RecoveryStrategy> {
        strategies_for(error)
    }

    pub fn stats(&self) -> &RecoveryStats {
        &self.stats
    }

    pub async fn stats_snapshot(&self) -> RecoveryStatsSnapshot {
        self.stats.snapshot().await
    }

    pub async fn attempts_for(&self, error: &ClassifiedError, context: &RecoveryContext) -> u32 {
        self.ledger
            .lock()
            .await
            .attempts(&Self::key(error, context))
    }

    pub async fn attempt_recovery(
        &self,
        error: &ClassifiedError,
        context: &RecoveryContext,
        actions: &dyn RecoveryActions,
    ) -> RecoveryResult {
        let key = Self::key(error, context);
        let mut result = RecoveryResult::new();

        let run = self.ledger.lock().await.record(&key, Utc::now());
        if run > self.config.max_attempts {
            log_warn!(
                "recovery for {} exhausted after {} runs",
                key,
                self.config.max_attempts
            );
            self.ledger.lock().await.reset(&key);
            result.exhausted = true;
            result.user_instruction = Some(error.error().user_message());
            return result;
        }

        log_info!(
            "recovering {} (run {}/{}): {}",
            key,
            run,
            self.config.max_attempts,
            error
        );

        for strategy in strategies_for(error.error()) {
            if strategy == RecoveryStrategy::UserIntervention {
                result.user_instruction = Some(error.error().user_message());
                result.attempts.push(StrategyAttempt {
                    strategy,
                    succeeded: false,
                    detail: None,
                });
                break;
            }

            let outcome = self.execute(strategy, context, actions).await;
            let succeeded = outcome.is_ok();
            self.stats
                .record(error.category(), strategy, succeeded)
                .await;

            match outcome {
                Ok(()) => {
                    log_info!("{} recovered via {}", key, strategy.as_str());
                    result.attempts.push(StrategyAttempt {
                        strategy,
                        succeeded: true,
                        detail: None,
                    });
                    result.recovered = true;
                    result.strategy_used = Some(strategy);
                    self.ledger.lock().await.reset(&key);
                    return result;
                }
                Err(err) => {
                    log_debug!("{} failed for {}: {:#}", strategy.as_str(), key, err);
                    result.attempts.push(StrategyAttempt {
                        strategy,
                        succeeded: false,
                        detail: Some(format!("{:#}", err)),
                    });
                }
            }
        }

        if result.user_instruction.is_none() {
            log_warn!("no strategy recovered {}", key);
        }
        result
    }

    pub async fn reset(&self) {
        self.ledger.lock().await.clear();
        self.stats.reset().await;
    }

    async fn execute(
        &self,
        strategy: RecoveryStrategy,
        context: &RecoveryContext,
        actions: &dyn RecoveryActions,
    ) -> anyhow::Result<()> {
        match strategy {
            RecoveryStrategy::AutomaticRetry => {
                tokio::time::sleep(self.config.retry_delay()).await;
                actions.retry_operation(context).await
            }
            RecoveryStrategy::FallbackToDefault => actions.apply_default(context).await,
            RecoveryStrategy::ClearAndReset => actions.reset_state(context).await,
            RecoveryStrategy::RequestPermission => {
                if actions.request_permission(context).await? {
                    Ok(())
                } else {
                    anyhow::bail!("permission not granted")
                }
            }
            RecoveryStrategy::RecoverFromBackup => actions.restore_backup(context).await,
            RecoveryStrategy::GracefulDegradation => actions.degrade(context).await,
            RecoveryStrategy::UserIntervention => {
                anyhow::bail!("user intervention cannot run automatically")
            }
        }
    }

    fn key(error: &ClassifiedError, context: &RecoveryContext) -> String {
        format!("{}:{}", error.category(), context.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant() -> RecoveryManager {
        RecoveryManager::new(RecoveryConfig {
            max_attempts: 3,
            retry_delay_ms: 0,
        })
    }

    #[derive(Default)]
    struct Scripted {
        retry_ok: bool,
        backup_ok: bool,
        grant: bool,
        retries: AtomicU32,
    }

    #[async_trait]
    impl RecoveryActions for Scripted {
        async fn retry_operation(&self, _context: &RecoveryContext) -> Result<()> {
            self.retries.fetch_add(1, Ordering::SeqCst);
            if self.retry_ok {
                Ok(())
            } else {
                bail!("still failing")
            }
        }

        async fn restore_backup(&self, _context: &RecoveryContext) -> Result<()> {
            if self.backup_ok {
                Ok(())
            } else {
                bail!("no backup")
            }
        }

        async fn request_permission(&self, _context: &RecoveryContext) -> Result<bool> {
            Ok(self.grant)
        }
    }

    fn save_failed() -> ClassifiedError {
        ClassifiedError::from(QuestError::SaveFailed {
            reason: "locked".into(),
        })
    }

    #[tokio::test]
    async fn test_falls_through_to_backup() {
        let manager = instant();
        let actions = Scripted {
            backup_ok: true,
            ..Default::default()
        };
        let result = manager
            .attempt_recovery(&save_failed(), &RecoveryContext::new("save quest"), &actions)
            .await;

        assert!(result.recovered);
        assert_eq!(result.strategy_used, Some(RecoveryStrategy::RecoverFromBackup));
        assert_eq!(result.attempts.len(), 2);
        assert!(!result.attempts[0].succeeded);

        let counts = manager
            .stats()
            .counts(ErrorCategory::Storage, RecoveryStrategy::RecoverFromBackup)
            .await;
        assert_eq!(counts.successes, 1);
    }

    #[tokio::test]
    async fn test_ends_with_user_instruction() {
        let manager = instant();
        let actions = Scripted::default();
        let result = manager
            .attempt_recovery(&save_failed(), &RecoveryContext::new("save quest"), &actions)
            .await;

        assert!(!result.recovered);
        assert!(result.user_instruction.is_some());
        assert_eq!(
            result.attempts.last().map(|a| a.strategy),
            Some(RecoveryStrategy::UserIntervention)
        );
        assert_eq!(actions.retries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_cap_per_operation() {
        let manager = instant();
        let actions = Scripted::default();
        let context = RecoveryContext::new("save quest");
        let error = save_failed();

        for _ in 0..3 {
            let result = manager.attempt_recovery(&error, &context, &actions).await;
            assert!(!result.exhausted);
        }
        let capped = manager.attempt_recovery(&error, &context, &actions).await;
        assert!(capped.exhausted);
        assert!(capped.attempts.is_empty());
        assert_eq!(actions.retries.load(Ordering::SeqCst), 3);

        let other = manager
            .attempt_recovery(&error, &RecoveryContext::new("load quest"), &actions)
            .await;
        assert!(!other.exhausted);
    }

    #[tokio::test]
    async fn test_success_clears_cap() {
        let manager = instant();
        let actions = Scripted {
            retry_ok: true,
            ..Default::default()
        };
        let context = RecoveryContext::new("save quest");
        manager.attempt_recovery(&save_failed(), &context, &actions).await;
        assert_eq!(manager.attempts_for(&save_failed(), &context).await, 0);
    }

    #[tokio::test]
    async fn test_denied_permission_degrades() {
        let manager = instant();
        let actions = Scripted::default();
        let error = ClassifiedError::from(QuestError::SensorPermissionDenied {
            sensor: "steps".into(),
        });
        let result = manager
            .attempt_recovery(&error, &RecoveryContext::new("read steps"), &actions)
            .await;

        assert!(!result.recovered);
        assert_eq!(result.attempts[0].strategy, RecoveryStrategy::RequestPermission);
        assert_eq!(
            result.attempts[0].detail.as_deref(),
            Some("permission not granted")
        );
        assert!(result.user_instruction.is_some());
    }
}
