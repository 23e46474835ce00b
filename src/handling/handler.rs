use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ClassifiedError, Severity};
use crate::log_severity;

use super::ledger::AttemptLedger;
use super::policy::HandlerConfig;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Actions offered to the user alongside a surfaced failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryOption {
    Retry,
    Skip,
    OpenSettings,
    Restart,
    ContactSupport,
}

impl RecoveryOption {
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryOption::Retry => "Try Again",
            RecoveryOption::Skip => "Skip",
            RecoveryOption::OpenSettings => "Open Settings",
            RecoveryOption::Restart => "Restart",
            RecoveryOption::ContactSupport => "Contact Support",
        }
    }
}

/// What to do about one failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlingDecision {
    pub should_retry: bool,
    pub retry_delay: Option<Duration>,
    /// 1-based retry number when `should_retry` is set.
    pub attempt: u32,
    pub user_message: Option<String>,
    pub recovery_options: Vec<RecoveryOption>,
    /// The caller should run the recovery manager for this failure.
    pub request_recovery: bool,
    /// The message was withheld because the same failure was shown recently.
    pub throttled: bool,
}

impl HandlingDecision {
    fn retry(attempt: u32, delay: Duration) -> Self {
        Self {
            should_retry: true,
            retry_delay: Some(delay),
            attempt,
            user_message: None,
            recovery_options: Vec::new(),
            request_recovery: false,
            throttled: false,
        }
    }

    fn surface(message: String, options: Vec<RecoveryOption>) -> Self {
        Self {
            should_retry: false,
            retry_delay: None,
            attempt: 0,
            user_message: Some(message),
            recovery_options: options,
            request_recovery: true,
            throttled: false,
        }
    }

    pub fn is_user_visible(&self) -> bool {
        self.user_message.is_some()
    }
}

/// Severity-driven failure dispatch.
///
/// Owns its retry counters and throttle marks, so each instance starts clean.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    config: HandlerConfig,
    ledger: AttemptLedger,
    last_surfaced: HashMap<String, DateTime<Utc>>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(HandlerConfig::default())
    }
}

impl ErrorHandler {
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            ledger: AttemptLedger::new(),
            last_surfaced: HashMap::new(),
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    pub fn handle(&mut self, error: &ClassifiedError) -> HandlingDecision {
        self.handle_at(error, Utc::now())
    }

    pub fn handle_at(&mut self, error: &ClassifiedError, now: DateTime<Utc>) -> HandlingDecision {
        let identity = error.identity();
        let severity = error.severity();
        let policy = *self.config.policy_for(severity);
        let permission_denial = error.error().is_permission_denial();

        log_severity!(severity, "handling {} (identity {})", error, identity);

        let mut exhausted = false;
        if error.is_retryable() && !permission_denial && policy.max_retries > 0 {
            let attempt = self.ledger.record(&identity, now);
            if attempt <= policy.max_retries {
                let delay = self.config.retry_delay(severity, attempt);
                log_debug!(
                    "retry {}/{} for {} in {:?}",
                    attempt,
                    policy.max_retries,
                    identity,
                    delay
                );
                return HandlingDecision::retry(attempt, delay);
            }
            self.ledger.reset(&identity);
            exhausted = true;
            log_info!("retries exhausted for {}", identity);
        }

        let options = if permission_denial {
            vec![RecoveryOption::OpenSettings, RecoveryOption::Skip]
        } else {
            match severity {
                Severity::Critical => vec![RecoveryOption::Restart, RecoveryOption::ContactSupport],
                _ if exhausted => vec![RecoveryOption::Retry, RecoveryOption::Skip],
                Severity::High => vec![RecoveryOption::Retry, RecoveryOption::Restart],
                Severity::Medium | Severity::Low => {
                    vec![RecoveryOption::Retry, RecoveryOption::Skip]
                }
            }
        };

        let mut decision = HandlingDecision::surface(error.error().user_message(), options);
        if self.recently_surfaced(&identity, now) {
            log_debug!("suppressing repeat of {} inside throttle window", identity);
            decision.user_message = None;
            decision.recovery_options.clear();
            decision.throttled = true;
        } else {
            self.last_surfaced.insert(identity, now);
        }
        decision
    }

    /// Forget retry history for a failure whose operation later succeeded.
    pub fn record_success(&mut self, identity: &str) {
        if self.ledger.reset(identity).is_some() {
            log_debug!("cleared retry history for {}", identity);
        }
    }

    /// Drop throttle marks that have aged out of the window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.config.throttle_window();
        self.last_surfaced.retain(|_, at| now - *at < window);
    }

    pub fn reset(&mut self) {
        self.ledger.clear();
        self.last_surfaced.clear();
    }

    fn recently_surfaced(&mut self, identity: &str, now: DateTime<Utc>) -> bool {
        self.prune(now);
        self.last_surfaced.contains_key(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QuestError;

    fn save_failed(reason: &str) -> ClassifiedError {
        ClassifiedError::from(QuestError::SaveFailed {
            reason: reason.to_string(),
        })
    }

    #[test]
    fn test_high_retries_three_times_then_surfaces() {
        let mut handler = ErrorHandler::default();
        let error = save_failed("disk busy");
        let now = Utc::now();

        let mut retries = 0;
        for expected_attempt in 1..=3 {
            let decision = handler.handle_at(&error, now);
            assert!(decision.should_retry);
            assert_eq!(decision.attempt, expected_attempt);
            assert!(decision.user_message.is_none());
            retries += 1;
        }
        assert_eq!(retries, 3);

        let final_decision = handler.handle_at(&error, now);
        assert!(!final_decision.should_retry);
        assert!(final_decision.user_message.is_some());
        assert!(final_decision.request_recovery);
        assert_eq!(
            final_decision.recovery_options,
            vec![RecoveryOption::Retry, RecoveryOption::Skip]
        );
        assert_eq!(handler.ledger().attempts(&error.identity()), 0);
    }

    #[test]
    fn test_backoff_doubles() {
        let mut handler = ErrorHandler::default();
        let error = save_failed("slow");
        let delays: Vec<_> = (0..3)
            .map(|_| handler.handle(&error).retry_delay.unwrap())
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn test_critical_never_retries() {
        let mut handler = ErrorHandler::default();
        let error = ClassifiedError::from(QuestError::StorageUnavailable {
            reason: "volume missing".into(),
        });
        let decision = handler.handle(&error);
        assert!(!decision.should_retry);
        assert_eq!(
            decision.recovery_options,
            vec![RecoveryOption::Restart, RecoveryOption::ContactSupport]
        );
        assert!(decision.user_message.is_some());
    }

    #[test]
    fn test_permission_denial_goes_to_settings() {
        let mut handler = ErrorHandler::default();
        let error = ClassifiedError::from(QuestError::SensorPermissionDenied {
            sensor: "heart rate".into(),
        });
        let decision = handler.handle(&error);
        assert!(!decision.should_retry);
        assert_eq!(decision.recovery_options[0], RecoveryOption::OpenSettings);
    }

    #[test]
    fn test_low_retries_silently_with_long_delay() {
        let mut handler = ErrorHandler::default();
        let error = ClassifiedError::from(QuestError::SensorTimeout {
            sensor: "step count".into(),
        });
        let decision = handler.handle(&error);
        assert!(decision.should_retry);
        assert!(!decision.is_user_visible());
        assert_eq!(decision.retry_delay, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_distinct_messages_keep_separate_counters() {
        let mut handler = ErrorHandler::default();
        let a = save_failed("a");
        let b = save_failed("b");
        handler.handle(&a);
        handler.handle(&a);
        let decision = handler.handle(&b);
        assert_eq!(decision.attempt, 1);
        assert_eq!(handler.ledger().attempts(&a.identity()), 2);
    }

    #[test]
    fn test_success_resets_counter() {
        let mut handler = ErrorHandler::default();
        let error = save_failed("flaky");
        handler.handle(&error);
        handler.handle(&error);
        handler.record_success(&error.identity());
        assert_eq!(handler.handle(&error).attempt, 1);
    }

    #[test]
    fn test_throttle_suppresses_repeat_surfacing() {
        let mut handler = ErrorHandler::default();
        let error = ClassifiedError::from(QuestError::DataCorrupted {
            reason: "bad checksum".into(),
        });
        let start = Utc::now();

        let first = handler.handle_at(&error, start);
        assert!(first.is_user_visible());

        let repeat = handler.handle_at(&error, start + chrono::Duration::seconds(30));
        assert!(repeat.throttled);
        assert!(!repeat.is_user_visible());

        let later = handler.handle_at(&error, start + chrono::Duration::seconds(61));
        assert!(later.is_user_visible());
        assert!(!later.throttled);
    }

    #[test]
    fn test_fresh_handler_per_case() {
        let mut first = ErrorHandler::default();
        let error = save_failed("x");
        first.handle(&error);
        let mut second = ErrorHandler::default();
        assert_eq!(second.handle(&error).attempt, 1);
    }
}
