use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::Violation;

use super::Severity;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    SensorAccess,
    Storage,
    QuestLogic,
    StateConsistency,
    Connectivity,
    InputValidation,
    PlatformResource,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::SensorAccess,
        ErrorCategory::Storage,
        ErrorCategory::QuestLogic,
        ErrorCategory::StateConsistency,
        ErrorCategory::Connectivity,
        ErrorCategory::InputValidation,
        ErrorCategory::PlatformResource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::SensorAccess => "sensor-access",
            ErrorCategory::Storage => "storage",
            ErrorCategory::QuestLogic => "quest-logic",
            ErrorCategory::StateConsistency => "state-consistency",
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::InputValidation => "input-validation",
            ErrorCategory::PlatformResource => "platform-resource",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way the progression pipeline can fail to complete an operation.
///
/// Category, severity and retryability are fixed per variant; see
/// [`QuestError::category`], [`QuestError::severity`] and
/// [`QuestError::is_retryable`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuestError {
    #[error("permission to read {sensor} was denied")]
    SensorPermissionDenied { sensor: String },

    #[error("{sensor} is not available on this device")]
    SensorUnavailable { sensor: String },

    #[error("query for {sensor} failed: {reason}")]
    SensorQueryFailed { sensor: String, reason: String },

    #[error("query for {sensor} timed out")]
    SensorTimeout { sensor: String },

    #[error("storage is unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("failed to save quest state: {reason}")]
    SaveFailed { reason: String },

    #[error("failed to load quest state: {reason}")]
    LoadFailed { reason: String },

    #[error("stored quest data is corrupted: {reason}")]
    DataCorrupted { reason: String },

    #[error("quest {quest_id} not found")]
    QuestNotFound { quest_id: String },

    #[error("cannot {action} a quest that is {state}")]
    InvalidTransition { state: String, action: String },

    #[error("progress calculation failed: {reason}")]
    ProgressCalculationFailed { reason: String },

    #[error("quest state is inconsistent: {reason}")]
    StateInconsistent { reason: String },

    #[error("quest {quest_id} was modified concurrently")]
    ConcurrentModification { quest_id: String },

    #[error("network is unavailable")]
    NetworkUnavailable,

    #[error("{operation} timed out")]
    RequestTimeout { operation: String },

    #[error("sync failed: {reason}")]
    SyncFailed { reason: String },

    #[error("validation failed: {0}")]
    ValidationFailed(Violation),

    #[error("device is out of memory")]
    OutOfMemory,

    #[error("device storage is full")]
    DiskFull,

    #[error("background task time expired")]
    BackgroundTaskExpired,
}

impl QuestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            QuestError::SensorPermissionDenied { .. }
            | QuestError::SensorUnavailable { .. }
            | QuestError::SensorQueryFailed { .. }
            | QuestError::SensorTimeout { .. } => ErrorCategory::SensorAccess,
            QuestError::StorageUnavailable { .. }
            | QuestError::SaveFailed { .. }
            | QuestError::LoadFailed { .. }
            | QuestError::DataCorrupted { .. } => ErrorCategory::Storage,
            QuestError::QuestNotFound { .. }
            | QuestError::InvalidTransition { .. }
            | QuestError::ProgressCalculationFailed { .. } => ErrorCategory::QuestLogic,
            QuestError::StateInconsistent { .. } | QuestError::ConcurrentModification { .. } => {
                ErrorCategory::StateConsistency
            }
            QuestError::NetworkUnavailable
            | QuestError::RequestTimeout { .. }
            | QuestError::SyncFailed { .. } => ErrorCategory::Connectivity,
            QuestError::ValidationFailed(_) => ErrorCategory::InputValidation,
            QuestError::OutOfMemory | QuestError::DiskFull | QuestError::BackgroundTaskExpired => {
                ErrorCategory::PlatformResource
            }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            QuestError::StorageUnavailable { .. }
            | QuestError::OutOfMemory
            | QuestError::DiskFull => Severity::Critical,
            QuestError::SaveFailed { .. }
            | QuestError::LoadFailed { .. }
            | QuestError::DataCorrupted { .. }
            | QuestError::StateInconsistent { .. } => Severity::High,
            QuestError::SensorPermissionDenied { .. }
            | QuestError::SensorUnavailable { .. }
            | QuestError::QuestNotFound { .. }
            | QuestError::InvalidTransition { .. }
            | QuestError::ProgressCalculationFailed { .. }
            | QuestError::ConcurrentModification { .. }
            | QuestError::SyncFailed { .. }
            | QuestError::ValidationFailed(_)
            | QuestError::BackgroundTaskExpired => Severity::Medium,
            QuestError::SensorQueryFailed { .. }
            | QuestError::SensorTimeout { .. }
            | QuestError::NetworkUnavailable
            | QuestError::RequestTimeout { .. } => Severity::Low,
        }
    }

    /// Transient failures are retryable; structural, corruption and
    /// permission failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            QuestError::SensorQueryFailed { .. }
            | QuestError::SensorTimeout { .. }
            | QuestError::SaveFailed { .. }
            | QuestError::LoadFailed { .. }
            | QuestError::ConcurrentModification { .. }
            | QuestError::NetworkUnavailable
            | QuestError::RequestTimeout { .. }
            | QuestError::SyncFailed { .. }
            | QuestError::BackgroundTaskExpired => true,
            QuestError::SensorPermissionDenied { .. }
            | QuestError::SensorUnavailable { .. }
            | QuestError::StorageUnavailable { .. }
            | QuestError::DataCorrupted { .. }
            | QuestError::QuestNotFound { .. }
            | QuestError::InvalidTransition { .. }
            | QuestError::ProgressCalculationFailed { .. }
            | QuestError::StateInconsistent { .. }
            | QuestError::ValidationFailed(_)
            | QuestError::OutOfMemory
            | QuestError::DiskFull => false,
        }
    }

    pub fn is_permission_denial(&self) -> bool {
        matches!(self, QuestError::SensorPermissionDenied { .. })
    }

    /// Human-readable cause shown when the failure reaches the user.
    pub fn user_message(&self) -> String {
        match self {
            QuestError::SensorPermissionDenied { sensor } => format!(
                "Access to {sensor} is turned off. Allow it in Settings to keep your quest moving."
            ),
            QuestError::SensorUnavailable { sensor } => {
                format!("This device can't provide {sensor}. Quest progress will use other activity.")
            }
            QuestError::SensorQueryFailed { .. } | QuestError::SensorTimeout { .. } => {
                "We couldn't read your latest activity. We'll keep trying.".to_string()
            }
            QuestError::StorageUnavailable { .. } => {
                "Your quest progress can't be saved right now. Restart the app to continue.".to_string()
            }
            QuestError::SaveFailed { .. } => "Your latest quest progress wasn't saved.".to_string(),
            QuestError::LoadFailed { .. } => "Your quest couldn't be loaded.".to_string(),
            QuestError::DataCorrupted { .. } => {
                "Some saved quest data was damaged and needs to be restored.".to_string()
            }
            QuestError::QuestNotFound { .. } => "That quest is no longer available.".to_string(),
            QuestError::InvalidTransition { .. } => {
                "That quest action isn't possible right now.".to_string()
            }
            QuestError::ProgressCalculationFailed { .. } => {
                "Quest progress couldn't be calculated from your latest activity.".to_string()
            }
            QuestError::StateInconsistent { .. } | QuestError::ConcurrentModification { .. } => {
                "Your quest got out of sync and needs to be refreshed.".to_string()
            }
            QuestError::NetworkUnavailable | QuestError::RequestTimeout { .. } => {
                "You're offline. Progress will sync when you're connected.".to_string()
            }
            QuestError::SyncFailed { .. } => "Quest progress couldn't be synced.".to_string(),
            QuestError::ValidationFailed(violation) => {
                format!("Some activity data looked wrong and was ignored ({}).", violation.field)
            }
            QuestError::OutOfMemory => "The device is low on memory. Restart the app.".to_string(),
            QuestError::DiskFull => "The device is out of storage space.".to_string(),
            QuestError::BackgroundTaskExpired => {
                "Background updates were paused. Open the app to catch up.".to_string()
            }
        }
    }

    /// Retry bookkeeping key: category plus a hash of the rendered message, so
    /// distinct errors of the same category never share a counter.
    pub fn identity(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.to_string().hash(&mut hasher);
        format!("{}:{:016x}", self.category(), hasher.finish())
    }
}

/// A [`QuestError`] tagged with its fixed classification.
///
/// Only constructible from a `QuestError`, so the category/severity pairing
/// always comes from the static table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    error: QuestError,
    category: ErrorCategory,
    severity: Severity,
    retryable: bool,
    occurred_at: DateTime<Utc>,
}

impl ClassifiedError {
    pub fn error(&self) -> &QuestError {
        &self.error
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn identity(&self) -> String {
        self.error.identity()
    }

    pub fn into_inner(self) -> QuestError {
        self.error
    }
}

impl From<QuestError> for ClassifiedError {
    fn from(error: QuestError) -> Self {
        Self {
            category: error.category(),
            severity: error.severity(),
            retryable: error.is_retryable(),
            occurred_at: Utc::now(),
            error,
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.severity, self.error)
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
