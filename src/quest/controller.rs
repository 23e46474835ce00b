use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    config::EngineConfig,
    db::{QuestLogEntry, QuestOutcome, QuestStore},
    errors::{ClassifiedError, QuestError},
    handling::{run_with_retry, ErrorHandler, Escalation, HandlingDecision},
    models::{
        ClassModifier, QuestDraft, QuestRecord, RawTelemetry, StoredQuest, TelemetrySnapshot,
        ValidationOutcome,
    },
    progress::CalculatorConfig,
    recovery::{
        RecoveryActions, RecoveryContext, RecoveryManager, RecoveryResult, RecoveryStatsSnapshot,
    },
    validation::{ProgressRules, Violation},
};

use super::recovery_actions::SlotRecovery;
use super::state::{QuestIntent, QuestSlot, QuestState, Transition, TransitionRejected};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// What happened to the durable copy after an accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "decision")]
pub enum PersistOutcome {
    Saved,
    /// Nothing to write.
    Unchanged,
    /// Persistence is switched off after a degradation; the slot is memory only.
    InMemory,
    /// The store kept failing. The in-memory state stands and the decision
    /// says what to tell the user.
    Deferred(HandlingDecision),
}

impl PersistOutcome {
    pub fn is_durable(&self) -> bool {
        matches!(self, PersistOutcome::Saved | PersistOutcome::Unchanged)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub transition: Transition,
    pub persist: PersistOutcome,
}

impl ProgressReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.transition, Transition::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelReport {
    pub quest: QuestRecord,
    pub persist: PersistOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub state: QuestState,
    pub quest_id: Option<String>,
    /// Fields repaired while loading.
    pub corrections: Vec<Violation>,
    pub persist: PersistOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestSnapshot {
    pub state: QuestState,
    pub quest: Option<StoredQuest>,
    pub intent: Option<QuestIntent>,
    pub last_telemetry: Option<TelemetrySnapshot>,
    pub persistence_degraded: bool,
}

/// Async owner of the quest slot, its store and the failure pipeline.
#[derive(Clone)]
pub struct QuestController {
    slot: Arc<Mutex<QuestSlot>>,
    store: Arc<dyn QuestStore>,
    handler: Arc<Mutex<ErrorHandler>>,
    recovery: RecoveryManager,
    calculator: CalculatorConfig,
    rules: ProgressRules,
    last_telemetry: Arc<Mutex<Option<TelemetrySnapshot>>>,
    persist_lock: Arc<Mutex<()>>,
    degraded: Arc<AtomicBool>,
}

impl QuestController {
    pub fn new(config: &EngineConfig, store: Arc<dyn QuestStore>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(QuestSlot::new())),
            store,
            handler: Arc::new(Mutex::new(ErrorHandler::new(config.handler.clone()))),
            recovery: RecoveryManager::new(config.recovery.clone()),
            calculator: config.calculator.clone(),
            rules: config.rules,
            last_telemetry: Arc::new(Mutex::new(None)),
            persist_lock: Arc::new(Mutex::new(())),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn snapshot(&self) -> QuestSnapshot {
        let (state, quest, intent) = {
            let slot = self.slot.lock().await;
            (
                slot.state(),
                slot.quest().map(QuestRecord::to_stored),
                slot.intent(),
            )
        };
        QuestSnapshot {
            state,
            quest,
            intent,
            last_telemetry: *self.last_telemetry.lock().await,
            persistence_degraded: self.is_degraded(),
        }
    }

    pub async fn state(&self) -> QuestState {
        self.slot.lock().await.state()
    }

    pub async fn intent(&self) -> Option<QuestIntent> {
        self.slot.lock().await.intent()
    }

    /// Intent for the quest in progress, if any.
    pub async fn active_intent(&self) -> Option<QuestIntent> {
        let slot = self.slot.lock().await;
        match slot.state() {
            QuestState::InProgress => slot.intent(),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub async fn accept_quest(
        &self,
        draft: QuestDraft,
    ) -> Result<ProgressReport, TransitionRejected> {
        let transition = self.slot.lock().await.accept_draft(draft)?;
        let persist = self.persist_active().await;
        Ok(ProgressReport {
            transition,
            persist,
        })
    }

    /// Validate a raw read and remember it as the latest telemetry.
    pub async fn ingest_telemetry(&self, raw: RawTelemetry) -> ValidationOutcome {
        let outcome = TelemetrySnapshot::from_raw(raw);
        *self.last_telemetry.lock().await = Some(outcome.snapshot);
        outcome
    }

    pub async fn apply_progress(
        &self,
        snapshot: TelemetrySnapshot,
        modifier: ClassModifier,
    ) -> Result<ProgressReport, TransitionRejected> {
        let (transition, closed) = {
            let mut slot = self.slot.lock().await;
            let transition =
                slot.apply_progress(&snapshot, modifier, &self.calculator, &self.rules)?;
            let closed = Self::log_entry_for(&slot, &transition);
            (transition, closed)
        };
        self.finish_transition(transition, closed).await
    }

    /// Apply a snapshot computed for `intent`, unless the slot moved on.
    pub async fn apply_deferred_progress(
        &self,
        intent: &QuestIntent,
        snapshot: TelemetrySnapshot,
        modifier: ClassModifier,
    ) -> Result<ProgressReport, TransitionRejected> {
        let (transition, closed) = {
            let mut slot = self.slot.lock().await;
            let transition = slot.apply_progress_for(
                intent,
                &snapshot,
                modifier,
                &self.calculator,
                &self.rules,
            )?;
            let closed = Self::log_entry_for(&slot, &transition);
            (transition, closed)
        };
        self.finish_transition(transition, closed).await
    }

    pub async fn complete_quest(
        &self,
        modifier: ClassModifier,
    ) -> Result<ProgressReport, TransitionRejected> {
        let (transition, closed) = {
            let mut slot = self.slot.lock().await;
            let transition = slot.complete(modifier)?;
            let closed = Self::log_entry_for(&slot, &transition);
            (transition, closed)
        };
        self.finish_transition(transition, closed).await
    }

    /// Drop the quest in the slot. An unfinished quest is archived as cancelled.
    pub async fn cancel_quest(&self) -> Result<CancelReport, TransitionRejected> {
        let quest = self
            .slot
            .lock()
            .await
            .cancel()
            .ok_or(TransitionRejected::NoActiveQuest)?;

        let mut persist = self.persist_active().await;
        if !quest.is_completed() {
            let entry = QuestLogEntry {
                quest_id: quest.id().to_string(),
                title: quest.title().to_string(),
                outcome: QuestOutcome::Cancelled,
                progress: quest.current_progress(),
                total: quest.total_progress(),
                xp: 0,
                gold: 0,
                closed_at: Utc::now(),
            };
            persist = worse(persist, self.archive(entry).await);
        }
        log_info!("quest {} cancelled", quest.id());

        Ok(CancelReport { quest, persist })
    }

    /// Load the stored active quest into the slot, repairing soft fields.
    pub async fn restore_active(&self) -> Result<RestoreReport, QuestError> {
        let store = Arc::clone(&self.store);
        let stored = run_with_retry(&self.handler, "load quest", || {
            let store = Arc::clone(&store);
            async move {
                store
                    .load_active()
                    .await
                    .map_err(|err| store_error(&err, |reason| QuestError::LoadFailed { reason }))
            }
        })
        .await
        .map_err(|escalation| escalation.error.into_inner())?;

        let Some(stored) = stored else {
            return Ok(RestoreReport {
                state: QuestState::NotStarted,
                quest_id: None,
                corrections: Vec::new(),
                persist: PersistOutcome::Unchanged,
            });
        };

        let (state, quest_id, corrections) =
            Self::install_record(&mut *self.slot.lock().await, stored)?;
        let persist = if corrections.is_empty() {
            PersistOutcome::Unchanged
        } else {
            self.persist_active().await
        };

        Ok(RestoreReport {
            state,
            quest_id: Some(quest_id),
            corrections,
            persist,
        })
    }

    pub async fn quest_log(&self, limit: usize) -> Result<Vec<QuestLogEntry>, QuestError> {
        self.store
            .quest_log(limit)
            .await
            .map_err(|err| store_error(&err, |reason| QuestError::LoadFailed { reason }))
    }

    pub async fn last_telemetry(&self) -> Option<TelemetrySnapshot> {
        *self.last_telemetry.lock().await
    }

    pub async fn handle_failure(&self, error: QuestError) -> HandlingDecision {
        let classified = ClassifiedError::from(error);
        self.handler.lock().await.handle(&classified)
    }

    /// Run the recovery chain with the slot as the collaborator.
    pub async fn attempt_recovery(
        &self,
        error: QuestError,
        context: RecoveryContext,
    ) -> RecoveryResult {
        let actions = SlotRecovery::new(self.clone());
        self.attempt_recovery_with(error, context, &actions).await
    }

    pub async fn attempt_recovery_with(
        &self,
        error: QuestError,
        context: RecoveryContext,
        actions: &dyn RecoveryActions,
    ) -> RecoveryResult {
        let classified = ClassifiedError::from(error);
        self.recovery
            .attempt_recovery(&classified, &context, actions)
            .await
    }

    pub async fn recovery_stats(&self) -> RecoveryStatsSnapshot {
        self.recovery.stats_snapshot().await
    }

    pub(crate) fn store(&self) -> &Arc<dyn QuestStore> {
        &self.store
    }

    pub(crate) fn slot(&self) -> &Arc<Mutex<QuestSlot>> {
        &self.slot
    }

    pub(crate) fn set_degraded(&self, degraded: bool) {
        if self.degraded.swap(degraded, Ordering::SeqCst) != degraded {
            if degraded {
                log_warn!("persistence disabled; quest state is kept in memory only");
            } else {
                log_info!("persistence re-enabled");
            }
        }
    }

    pub(crate) async fn clear_telemetry(&self) {
        *self.last_telemetry.lock().await = None;
    }

    /// Validate a stored quest and put it in the slot.
    pub(crate) fn install_record(
        slot: &mut QuestSlot,
        stored: StoredQuest,
    ) -> Result<(QuestState, String, Vec<Violation>), QuestError> {
        let quest_id = stored.id.clone();
        let loaded = QuestRecord::from_stored(stored).map_err(|violations| {
            let fields: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
            QuestError::DataCorrupted {
                reason: format!("quest {quest_id}: {}", fields.join("; ")),
            }
        })?;
        if !loaded.corrections.is_empty() {
            log_warn!(
                "quest {} loaded with {} correction(s)",
                quest_id,
                loaded.corrections.len()
            );
        }
        let state = slot.restore(loaded.record);
        Ok((state, quest_id, loaded.corrections))
    }

    /// Put the newest readable backup back into the slot.
    ///
    /// The backup is refused if the slot holds another quest, or if the slot
    /// is further along than the backup. The slot only changes once the backup
    /// has been written back to the store.
    pub(crate) async fn restore_from_backup(
        &self,
        intent: Option<&QuestIntent>,
    ) -> anyhow::Result<String> {
        if self.is_degraded() {
            bail!("persistence is disabled; a backup cannot be written back");
        }

        let _serial = self.persist_lock.lock().await;
        let mut slot = self.slot.lock().await;
        ensure_generation(&slot, intent)?;

        let wanted = intent
            .map(|intent| intent.quest_id.clone())
            .or_else(|| slot.quest().map(|quest| quest.id().to_string()));
        let stored = self
            .store
            .load_backup(wanted.as_deref())
            .await?
            .ok_or_else(|| anyhow!("no readable backup"))?;
        let loaded = QuestRecord::from_stored(stored).map_err(|violations| {
            anyhow!("backup failed validation with {} violation(s)", violations.len())
        })?;
        let restored = loaded.record;

        if let Some(current) = slot.quest() {
            if current.id() != restored.id() {
                bail!(
                    "slot holds quest {}, backup is for quest {}",
                    current.id(),
                    restored.id()
                );
            }
            let behind = restored.current_progress() < current.current_progress()
                || (current.is_completed() && !restored.is_completed());
            if behind {
                bail!(
                    "backup of quest {} is behind the slot ({:.1} < {:.1})",
                    restored.id(),
                    restored.current_progress(),
                    current.current_progress()
                );
            }
        }

        self.store
            .save_active(&restored.to_stored())
            .await
            .context("restored backup could not be saved")?;

        let quest_id = restored.id().to_string();
        if !loaded.corrections.is_empty() {
            log_warn!(
                "backup of quest {} restored with {} correction(s)",
                quest_id,
                loaded.corrections.len()
            );
        }
        slot.restore(restored);
        Ok(quest_id)
    }

    /// Clear the stored copy, then empty the slot. A quest still in progress
    /// is never reset.
    pub(crate) async fn reset_slot(
        &self,
        intent: Option<&QuestIntent>,
    ) -> anyhow::Result<Option<QuestRecord>> {
        let _serial = self.persist_lock.lock().await;
        let mut slot = self.slot.lock().await;
        ensure_generation(&slot, intent)?;

        if let (QuestState::InProgress, Some(quest)) = (slot.state(), slot.quest()) {
            bail!("quest {} is in progress and will not be reset", quest.id());
        }
        if !self.is_degraded() {
            self.store.clear_active().await?;
        }
        Ok(slot.cancel())
    }

    /// Write the slot's current quest, or clear the stored copy if the slot
    /// is empty.
    pub(crate) async fn persist_active(&self) -> PersistOutcome {
        if self.is_degraded() {
            return PersistOutcome::InMemory;
        }

        let _serial = self.persist_lock.lock().await;
        let stored = self.slot.lock().await.quest().map(QuestRecord::to_stored);
        let store = Arc::clone(&self.store);

        let result = match stored {
            Some(stored) => {
                run_with_retry(&self.handler, "save quest", || {
                    let store = Arc::clone(&store);
                    let stored = stored.clone();
                    async move {
                        store
                            .save_active(&stored)
                            .await
                            .map_err(|err| {
                                store_error(&err, |reason| QuestError::SaveFailed { reason })
                            })
                    }
                })
                .await
            }
            None => {
                run_with_retry(&self.handler, "clear quest", || {
                    let store = Arc::clone(&store);
                    async move {
                        store
                            .clear_active()
                            .await
                            .map_err(|err| {
                                store_error(&err, |reason| QuestError::SaveFailed { reason })
                            })
                    }
                })
                .await
            }
        };

        deferred_on_escalation(result)
    }

    async fn archive(&self, entry: QuestLogEntry) -> PersistOutcome {
        if self.is_degraded() {
            return PersistOutcome::InMemory;
        }
        let store = Arc::clone(&self.store);
        let result = run_with_retry(&self.handler, "archive quest", || {
            let store = Arc::clone(&store);
            let entry = entry.clone();
            async move {
                store
                    .append_log(&entry)
                    .await
                    .map_err(|err| store_error(&err, |reason| QuestError::SaveFailed { reason }))
            }
        })
        .await;
        deferred_on_escalation(result)
    }

    async fn finish_transition(
        &self,
        transition: Transition,
        closed: Option<QuestLogEntry>,
    ) -> Result<ProgressReport, TransitionRejected> {
        let mut persist = match transition {
            Transition::AlreadyComplete => PersistOutcome::Unchanged,
            _ => self.persist_active().await,
        };
        if let Some(entry) = closed {
            persist = worse(persist, self.archive(entry).await);
        }

        if let Transition::Completed {
            quest_id,
            raised_from,
            rewards,
            ..
        } = &transition
        {
            match raised_from {
                Some(from) => log_warn!(
                    "quest {} completed early from {:.1}; rewards xp={} gold={}",
                    quest_id,
                    from,
                    rewards.xp,
                    rewards.gold
                ),
                None => log_info!(
                    "quest {} completed; rewards xp={} gold={}",
                    quest_id,
                    rewards.xp,
                    rewards.gold
                ),
            }
        }

        Ok(ProgressReport {
            transition,
            persist,
        })
    }

    fn log_entry_for(slot: &QuestSlot, transition: &Transition) -> Option<QuestLogEntry> {
        let Transition::Completed {
            progress,
            total,
            rewards,
            ..
        } = transition
        else {
            return None;
        };
        let quest = slot.quest()?;
        Some(QuestLogEntry {
            quest_id: quest.id().to_string(),
            title: quest.title().to_string(),
            outcome: QuestOutcome::Completed,
            progress: *progress,
            total: *total,
            xp: rewards.xp,
            gold: rewards.gold,
            closed_at: quest.completed_at().unwrap_or_else(Utc::now),
        })
    }
}

/// Fail when `intent` no longer names the quest in the slot.
pub(crate) fn ensure_generation(
    slot: &QuestSlot,
    intent: Option<&QuestIntent>,
) -> anyhow::Result<()> {
    match intent {
        Some(intent) if intent.generation != slot.generation() => bail!(
            "quest {} (generation {}) is no longer in the slot",
            intent.quest_id,
            intent.generation
        ),
        _ => Ok(()),
    }
}

fn deferred_on_escalation(result: Result<(), Escalation>) -> PersistOutcome {
    match result {
        Ok(()) => PersistOutcome::Saved,
        Err(escalation) => {
            log_error!("{}; keeping in-memory state", escalation);
            PersistOutcome::Deferred(escalation.decision)
        }
    }
}

fn worse(current: PersistOutcome, next: PersistOutcome) -> PersistOutcome {
    match (&current, &next) {
        (PersistOutcome::Deferred(_), _) => current,
        (_, PersistOutcome::Deferred(_)) => next,
        (PersistOutcome::InMemory, _) => current,
        (_, PersistOutcome::InMemory) => next,
        (PersistOutcome::Unchanged, _) => next,
        _ => current,
    }
}

/// Map a store failure onto the taxonomy. Undecodable payloads and SQLite
/// corruption become `DataCorrupted`; anything unrecognised goes to `other`.
pub(crate) fn store_error(
    err: &anyhow::Error,
    other: impl FnOnce(String) -> QuestError,
) -> QuestError {
    let reason = format!("{err:#}");

    if err.downcast_ref::<serde_json::Error>().is_some() {
        return QuestError::DataCorrupted { reason };
    }

    let sqlite = err.downcast_ref::<rusqlite::Error>();
    if let Some(rusqlite::Error::SqliteFailure(failure, _)) = sqlite {
        match failure.code {
            rusqlite::ErrorCode::DiskFull => return QuestError::DiskFull,
            rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                return QuestError::DataCorrupted { reason }
            }
            rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::ReadOnly => {
                return QuestError::StorageUnavailable { reason }
            }
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                return QuestError::ConcurrentModification {
                    quest_id: "active".into(),
                }
            }
            _ => {}
        }
    }

    other(reason)
}
