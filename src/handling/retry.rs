use std::future::Future;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::errors::{ClassifiedError, QuestError};

use super::handler::{ErrorHandler, HandlingDecision};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// A failure the handler decided not to retry any further.
#[derive(Error, Debug, Clone)]
#[error("{operation} failed: {error}")]
pub struct Escalation {
    pub operation: String,
    pub error: ClassifiedError,
    pub decision: HandlingDecision,
}

/// Run `attempt` until it succeeds or the handler stops asking for retries.
///
/// The handler lock is only held while deciding, never across the sleep.
pub async fn run_with_retry<T, F, Fut>(
    handler: &Mutex<ErrorHandler>,
    operation: &str,
    mut attempt: F,
) -> Result<T, Escalation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, QuestError>>,
{
    let mut failed_identities: Vec<String> = Vec::new();

    loop {
        match attempt().await {
            Ok(value) => {
                if !failed_identities.is_empty() {
                    let mut guard = handler.lock().await;
                    for identity in &failed_identities {
                        guard.record_success(identity);
                    }
                }
                return Ok(value);
            }
            Err(err) => {
                let classified = ClassifiedError::from(err);
                let identity = classified.identity();
                let decision = handler.lock().await.handle(&classified);

                if decision.should_retry {
                    if !failed_identities.contains(&identity) {
                        failed_identities.push(identity);
                    }
                    let delay = decision.retry_delay.unwrap_or_default();
                    log_warn!(
                        "{} failed ({}); retry {} in {:?}",
                        operation,
                        classified,
                        decision.attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                return Err(Escalation {
                    operation: operation.to_string(),
                    error: classified,
                    decision,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handling::policy::{HandlerConfig, TierPolicy};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> HandlerConfig {
        let fast = TierPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            multiplier: 2.0,
            max_delay_ms: 5,
        };
        HandlerConfig {
            high: fast,
            medium: fast,
            low: fast,
            ..HandlerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let handler = Mutex::new(ErrorHandler::new(fast_config()));
        let calls = AtomicU32::new(0);

        let result = run_with_retry(&handler, "save quest", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(QuestError::SaveFailed {
                        reason: "locked".into(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(handler.lock().await.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_escalates_after_exhaustion() {
        let handler = Mutex::new(ErrorHandler::new(fast_config()));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = run_with_retry(&handler, "save quest", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(QuestError::SaveFailed {
                    reason: "disk gone".into(),
                })
            }
        })
        .await;

        let escalation = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(!escalation.decision.should_retry);
        assert!(escalation.decision.user_message.is_some());
    }

    #[tokio::test]
    async fn test_non_retryable_escalates_immediately() {
        let handler = Mutex::new(ErrorHandler::new(fast_config()));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = run_with_retry(&handler, "load quest", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(QuestError::DataCorrupted {
                    reason: "truncated".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
