use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::QuestError;
use crate::quest::QuestIntent;

/// One concrete remediation, tried in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryStrategy {
    AutomaticRetry,
    FallbackToDefault,
    ClearAndReset,
    RequestPermission,
    RecoverFromBackup,
    GracefulDegradation,
    UserIntervention,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::AutomaticRetry => "automatic-retry",
            RecoveryStrategy::FallbackToDefault => "fallback-to-default",
            RecoveryStrategy::ClearAndReset => "clear-and-reset",
            RecoveryStrategy::RequestPermission => "request-permission",
            RecoveryStrategy::RecoverFromBackup => "recover-from-backup",
            RecoveryStrategy::GracefulDegradation => "graceful-degradation",
            RecoveryStrategy::UserIntervention => "user-intervention",
        }
    }
}

/// Ordered strategy list for a failure.
pub fn strategies_for(error: &QuestError) -> Vec<RecoveryStrategy> {
    use RecoveryStrategy::*;

    match error {
        QuestError::SensorPermissionDenied { .. } => {
            vec![RequestPermission, GracefulDegradation, UserIntervention]
        }
        QuestError::SensorUnavailable { .. } => vec![GracefulDegradation, UserIntervention],
        QuestError::SensorQueryFailed { .. } | QuestError::SensorTimeout { .. } => {
            vec![AutomaticRetry, FallbackToDefault, GracefulDegradation]
        }
        QuestError::StorageUnavailable { .. } => vec![GracefulDegradation, UserIntervention],
        QuestError::SaveFailed { .. } | QuestError::LoadFailed { .. } => vec![
            AutomaticRetry,
            RecoverFromBackup,
            GracefulDegradation,
            UserIntervention,
        ],
        QuestError::DataCorrupted { .. } | QuestError::StateInconsistent { .. } => {
            vec![RecoverFromBackup, ClearAndReset, UserIntervention]
        }
        QuestError::QuestNotFound { .. } => vec![ClearAndReset, UserIntervention],
        QuestError::InvalidTransition { .. } => vec![UserIntervention],
        QuestError::ProgressCalculationFailed { .. } => {
            vec![FallbackToDefault, GracefulDegradation]
        }
        QuestError::ConcurrentModification { .. } => {
            vec![AutomaticRetry, GracefulDegradation, UserIntervention]
        }
        QuestError::NetworkUnavailable
        | QuestError::RequestTimeout { .. }
        | QuestError::SyncFailed { .. }
        | QuestError::BackgroundTaskExpired => vec![AutomaticRetry, GracefulDegradation],
        QuestError::ValidationFailed(_) => vec![FallbackToDefault],
        QuestError::OutOfMemory => vec![GracefulDegradation, UserIntervention],
        QuestError::DiskFull => vec![UserIntervention],
    }
}

/// Where a recovery is happening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryContext {
    /// Operation that failed, e.g. `"save quest"`.
    pub operation: String,
    /// Quest the failed operation was working on, if any.
    pub intent: Option<QuestIntent>,
}

impl RecoveryContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            intent: None,
        }
    }

    pub fn with_intent(mut self, intent: QuestIntent) -> Self {
        self.intent = Some(intent);
        self
    }
}

/// Side effects a strategy can ask for. Implementations only need the ones
/// that make sense for them; the rest report failure.
#[async_trait]
pub trait RecoveryActions: Send + Sync {
    async fn retry_operation(&self, context: &RecoveryContext) -> Result<()> {
        bail!("retry is not supported for {}", context.operation)
    }

    async fn apply_default(&self, context: &RecoveryContext) -> Result<()> {
        bail!("no default value for {}", context.operation)
    }

    async fn reset_state(&self, context: &RecoveryContext) -> Result<()> {
        bail!("nothing to reset for {}", context.operation)
    }

    /// `Ok(true)` when the permission was granted.
    async fn request_permission(&self, context: &RecoveryContext) -> Result<bool> {
        bail!("no permission to request for {}", context.operation)
    }

    async fn restore_backup(&self, context: &RecoveryContext) -> Result<()> {
        bail!("no backup available for {}", context.operation)
    }

    async fn degrade(&self, context: &RecoveryContext) -> Result<()> {
        bail!("cannot degrade {}", context.operation)
    }
}
