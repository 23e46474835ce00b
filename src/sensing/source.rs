use async_trait::async_trait;

use crate::errors::QuestError;
use crate::models::RawTelemetry;

/// Something that can be polled for activity since the previous read.
///
/// Failures are reported in the quest taxonomy (`SensorPermissionDenied`,
/// `SensorUnavailable`, `SensorQueryFailed`, ...). Timeouts are imposed by
/// the caller.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Short human name used in logs and error messages, e.g. `"step count"`.
    fn name(&self) -> &str;

    async fn read(&self) -> Result<RawTelemetry, QuestError>;

    /// Ask the platform for read access again. `Ok(true)` when granted.
    async fn request_access(&self) -> Result<bool, QuestError> {
        Ok(false)
    }
}
