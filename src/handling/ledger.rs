use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Attempts made so far for one failing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAttempt {
    pub attempts: u32,
    pub last_attempt: DateTime<Utc>,
}

/// In-memory attempt counters keyed by an error or operation identity.
/// Nothing here survives a restart.
#[derive(Debug, Default, Clone)]
pub struct AttemptLedger {
    entries: HashMap<String, RecoveryAttempt>,
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more attempt for `key` and return the new total.
    pub fn record(&mut self, key: &str, now: DateTime<Utc>) -> u32 {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RecoveryAttempt {
                attempts: 0,
                last_attempt: now,
            });
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_attempt = now;
        entry.attempts
    }

    pub fn get(&self, key: &str) -> Option<RecoveryAttempt> {
        self.entries.get(key).copied()
    }

    pub fn attempts(&self, key: &str) -> u32 {
        self.entries.get(key).map(|entry| entry.attempts).unwrap_or(0)
    }

    pub fn reset(&mut self, key: &str) -> Option<RecoveryAttempt> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
