use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::errors::QuestError;
use crate::models::{ClassModifier, RawTelemetry};
use crate::quest::{QuestController, QuestIntent, Transition, TransitionRejected};
use crate::recovery::{RecoveryActions, RecoveryContext};

use super::source::TelemetrySource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensingConfig {
    pub poll_interval_ms: u64,
    /// Poll interval used when `STRIDEQUEST_DEBUG` is set.
    pub debug_poll_interval_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            debug_poll_interval_ms: 5_000,
            read_timeout_ms: 10_000,
        }
    }
}

impl SensingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

/// Counters for one run of the sensing loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensingSummary {
    pub reads: u64,
    pub rejected_fields: u64,
    pub failures: u64,
    pub recoveries: u64,
    pub completed: bool,
}

enum PollStep {
    Continue,
    Stop,
}

pub async fn sensing_loop(
    controller: QuestController,
    source: Arc<dyn TelemetrySource>,
    modifier: ClassModifier,
    config: SensingConfig,
    cancel_token: CancellationToken,
) -> SensingSummary {
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut summary = SensingSummary::default();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let step = poll_once(&controller, &source, modifier, &config, &mut summary).await;
                if let PollStep::Stop = step {
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sensing loop shutting down");
                break;
            }
        }
    }

    log_info!(
        "sensing loop for {} finished: {} read(s), {} failure(s), completed={}",
        source.name(),
        summary.reads,
        summary.failures,
        summary.completed
    );
    summary
}

async fn poll_once(
    controller: &QuestController,
    source: &Arc<dyn TelemetrySource>,
    modifier: ClassModifier,
    config: &SensingConfig,
    summary: &mut SensingSummary,
) -> PollStep {
    let Some(intent) = controller.active_intent().await else {
        log_info!("no quest in progress; sensing stops");
        return PollStep::Stop;
    };

    let error = match tokio::time::timeout(config.read_timeout(), source.read()).await {
        Ok(Ok(raw)) => return apply_read(controller, &intent, raw, modifier, summary).await,
        Ok(Err(err)) => err,
        Err(_) => {
            log_warn!(
                "{} read timeout (> {:?}) for quest {}",
                source.name(),
                config.read_timeout(),
                intent.quest_id
            );
            QuestError::SensorTimeout {
                sensor: source.name().to_string(),
            }
        }
    };

    summary.failures += 1;
    let decision = controller.handle_failure(error.clone()).await;
    if decision.should_retry {
        log_debug!(
            "{} read failed ({}); retry {} on a later tick",
            source.name(),
            error,
            decision.attempt
        );
    }
    if !decision.request_recovery {
        return PollStep::Continue;
    }

    let actions = ReadRecovery {
        source: Arc::clone(source),
        timeout: config.read_timeout(),
        recovered: Mutex::new(None),
    };
    let context =
        RecoveryContext::new(format!("read {}", source.name())).with_intent(intent.clone());
    let result = controller
        .attempt_recovery_with(error, context, &actions)
        .await;

    if let Some(instruction) = &result.user_instruction {
        log_warn!("{} needs attention: {}", source.name(), instruction);
    }
    if !result.recovered {
        return PollStep::Continue;
    }

    summary.recoveries += 1;
    let recovered = actions.recovered.lock().await.take();
    match recovered {
        Some(raw) => apply_read(controller, &intent, raw, modifier, summary).await,
        None => PollStep::Continue,
    }
}

async fn apply_read(
    controller: &QuestController,
    intent: &QuestIntent,
    raw: RawTelemetry,
    modifier: ClassModifier,
    summary: &mut SensingSummary,
) -> PollStep {
    summary.reads += 1;
    let outcome = controller.ingest_telemetry(raw).await;
    summary.rejected_fields += outcome.rejected.len() as u64;

    match controller
        .apply_deferred_progress(intent, outcome.snapshot, modifier)
        .await
    {
        Ok(report) if report.is_completed() => {
            summary.completed = true;
            PollStep::Stop
        }
        Ok(report) if report.transition == Transition::AlreadyComplete => PollStep::Stop,
        Ok(_) => PollStep::Continue,
        Err(TransitionRejected::StaleIntent { quest_id }) => {
            log_debug!("read for quest {} arrived after the slot changed", quest_id);
            PollStep::Continue
        }
        Err(TransitionRejected::NoActiveQuest) => PollStep::Stop,
        Err(rejected) => {
            log_error!("telemetry for quest {} not applied: {}", intent.quest_id, rejected);
            PollStep::Continue
        }
    }
}

/// Recovery actions for a failed read.
struct ReadRecovery {
    source: Arc<dyn TelemetrySource>,
    timeout: Duration,
    /// A successful retry's read, applied once recovery returns.
    recovered: Mutex<Option<RawTelemetry>>,
}

#[async_trait]
impl RecoveryActions for ReadRecovery {
    async fn retry_operation(&self, context: &RecoveryContext) -> Result<()> {
        let raw = tokio::time::timeout(self.timeout, self.source.read())
            .await
            .map_err(|_| anyhow!("{} timed out again", context.operation))??;
        *self.recovered.lock().await = Some(raw);
        Ok(())
    }

    /// Skip this sample; an empty read adds no progress.
    async fn apply_default(&self, context: &RecoveryContext) -> Result<()> {
        log_debug!("{}: sample skipped", context.operation);
        Ok(())
    }

    async fn request_permission(&self, _context: &RecoveryContext) -> Result<bool> {
        Ok(self.source.request_access().await?)
    }

    /// Keep polling; other sensors still contribute.
    async fn degrade(&self, context: &RecoveryContext) -> Result<()> {
        log_warn!("{}: continuing with partial telemetry", context.operation);
        Ok(())
    }
}
