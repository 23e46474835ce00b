use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::Severity;

const MAX_THROTTLE_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// Retry behavior for one severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierPolicy {
    /// Automatic retries before the failure is surfaced. Zero disables retry.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl TierPolicy {
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            multiplier: 1.0,
            max_delay_ms: 0,
        }
    }

    /// Exponential backoff for the `attempt`-th retry (1-based):
    /// `base * multiplier^(attempt - 1)`, capped at `max_delay_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powf(attempt.saturating_sub(1) as f64);
        let delay_ms = (self.base_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms.max(0.0) as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandlerConfig {
    pub critical: TierPolicy,
    pub high: TierPolicy,
    pub medium: TierPolicy,
    pub low: TierPolicy,
    /// Identical errors surfaced again within this window are suppressed.
    pub throttle_window_secs: u64,
    /// Spread delays by 0.5x..1.5x.
    pub jitter: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            critical: TierPolicy::no_retry(),
            high: TierPolicy {
                max_retries: 3,
                base_delay_ms: 1_000,
                multiplier: 2.0,
                max_delay_ms: 30_000,
            },
            medium: TierPolicy {
                max_retries: 2,
                base_delay_ms: 2_000,
                multiplier: 2.0,
                max_delay_ms: 30_000,
            },
            low: TierPolicy {
                max_retries: 3,
                base_delay_ms: 5_000,
                multiplier: 2.0,
                max_delay_ms: 60_000,
            },
            throttle_window_secs: 60,
            jitter: false,
        }
    }
}

impl HandlerConfig {
    pub fn policy_for(&self, severity: Severity) -> &TierPolicy {
        match severity {
            Severity::Critical => &self.critical,
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
        }
    }

    pub fn throttle_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.throttle_window_secs.min(MAX_THROTTLE_WINDOW_SECS) as i64)
    }

    /// Delay for a retry, with jitter applied when enabled.
    pub fn retry_delay(&self, severity: Severity, attempt: u32) -> Duration {
        let delay = self.policy_for(severity).delay(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
        delay.mul_f64(factor)
    }
}
