use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::recovery::{RecoveryActions, RecoveryContext};

use super::controller::{ensure_generation, PersistOutcome, QuestController};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Recovery side effects backed by a controller's slot and store.
///
/// Every action that touches the slot first checks the context's intent, so a
/// recovery started for one quest cannot rewrite another.
pub struct SlotRecovery {
    controller: QuestController,
}

impl SlotRecovery {
    pub fn new(controller: QuestController) -> Self {
        Self { controller }
    }

    async fn ensure_current(&self, context: &RecoveryContext) -> Result<()> {
        let slot = self.controller.slot().lock().await;
        ensure_generation(&slot, context.intent.as_ref())
    }
}

#[async_trait]
impl RecoveryActions for SlotRecovery {
    /// Write the slot again.
    async fn retry_operation(&self, context: &RecoveryContext) -> Result<()> {
        self.ensure_current(context).await?;
        let was_degraded = self.controller.is_degraded();
        self.controller.set_degraded(false);
        match self.controller.persist_active().await {
            PersistOutcome::Saved | PersistOutcome::Unchanged => Ok(()),
            other => {
                self.controller.set_degraded(was_degraded);
                Err(anyhow!("{} still failing: {:?}", context.operation, other))
            }
        }
    }

    /// Forget the last telemetry read so the next one starts clean.
    async fn apply_default(&self, context: &RecoveryContext) -> Result<()> {
        self.ensure_current(context).await?;
        self.controller.clear_telemetry().await;
        log_info!("{}: telemetry reset to defaults", context.operation);
        Ok(())
    }

    /// Clear the stored copy and empty a slot that holds no live quest.
    async fn reset_state(&self, context: &RecoveryContext) -> Result<()> {
        let removed = self.controller.reset_slot(context.intent.as_ref()).await?;
        log_info!(
            "{}: slot reset (dropped {})",
            context.operation,
            removed
                .as_ref()
                .map(|quest| quest.id().to_string())
                .unwrap_or_else(|| "nothing".into())
        );
        Ok(())
    }

    async fn restore_backup(&self, context: &RecoveryContext) -> Result<()> {
        let restored_id = self
            .controller
            .restore_from_backup(context.intent.as_ref())
            .await?;
        log_info!("{}: restored quest {} from backup", context.operation, restored_id);
        Ok(())
    }

    /// Keep playing without persistence.
    async fn degrade(&self, _context: &RecoveryContext) -> Result<()> {
        self.controller.set_degraded(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::db::{Database, QuestStore};
    use crate::errors::QuestError;
    use crate::models::{ClassModifier, QuestDraft, QuestKind, RawTelemetry};
    use crate::quest::QuestState;
    use crate::recovery::RecoveryStrategy;
    use std::sync::Arc;

    fn controller() -> QuestController {
        let mut config = EngineConfig::default();
        config.recovery.retry_delay_ms = 0;
        QuestController::new(&config, Arc::new(Database::open_in_memory().unwrap()))
    }

    fn draft() -> QuestDraft {
        QuestDraft {
            title: "Shire loop".into(),
            description: "Around Hobbiton".into(),
            total_progress: 50.0,
            xp_reward: 10,
            gold_reward: 5,
            kind: QuestKind::Distance,
            encounters: Vec::new(),
        }
    }

    async fn walk(controller: &QuestController, steps: i64) {
        let snapshot = controller
            .ingest_telemetry(RawTelemetry {
                steps,
                ..RawTelemetry::default()
            })
            .await
            .snapshot;
        controller
            .apply_progress(snapshot, ClassModifier::UNMODIFIED)
            .await
            .unwrap();
    }

    async fn progress(controller: &QuestController) -> f64 {
        controller.snapshot().await.quest.unwrap().current_progress
    }

    #[tokio::test]
    async fn test_save_failure_recovers_by_retrying() {
        let controller = controller();
        controller.accept_quest(draft()).await.unwrap();
        let intent = controller.intent().await.unwrap();

        let result = controller
            .attempt_recovery(
                QuestError::SaveFailed {
                    reason: "transient".into(),
                },
                RecoveryContext::new("save quest").with_intent(intent),
            )
            .await;

        assert!(result.recovered);
        assert_eq!(result.strategy_used, Some(RecoveryStrategy::AutomaticRetry));
    }

    #[tokio::test]
    async fn test_stale_intent_is_refused() {
        let controller = controller();
        controller.accept_quest(draft()).await.unwrap();
        let stale = controller.intent().await.unwrap();
        controller.cancel_quest().await.unwrap();
        controller.accept_quest(draft()).await.unwrap();

        let actions = SlotRecovery::new(controller.clone());
        let context = RecoveryContext::new("save quest").with_intent(stale);
        assert!(actions.reset_state(&context).await.is_err());
        assert_eq!(controller.state().await, QuestState::InProgress);
    }

    #[tokio::test]
    async fn test_corruption_restores_backup() {
        let controller = controller();
        controller.accept_quest(draft()).await.unwrap();
        let intent = controller.intent().await.unwrap();
        // A second save moves the first payload into the backups.
        controller.persist_active().await;

        let result = controller
            .attempt_recovery(
                QuestError::DataCorrupted {
                    reason: "bad payload".into(),
                },
                RecoveryContext::new("load quest"),
            )
            .await;

        assert!(result.recovered);
        assert_eq!(result.strategy_used, Some(RecoveryStrategy::RecoverFromBackup));
        assert_eq!(
            controller.snapshot().await.quest.map(|q| q.id),
            Some(intent.quest_id)
        );
    }

    #[tokio::test]
    async fn test_degrade_switches_to_memory() {
        let controller = controller();
        let actions = SlotRecovery::new(controller.clone());
        actions.degrade(&RecoveryContext::new("save quest")).await.unwrap();
        let report = controller.accept_quest(draft()).await.unwrap();
        assert_eq!(report.persist, PersistOutcome::InMemory);
    }

    #[tokio::test]
    async fn test_backup_behind_the_slot_is_refused() {
        let controller = controller();
        controller.accept_quest(draft()).await.unwrap();
        walk(&controller, 2_000).await;
        walk(&controller, 1_000).await;
        let intent = controller.intent().await.unwrap();

        let actions = SlotRecovery::new(controller.clone());
        let context = RecoveryContext::new("save quest").with_intent(intent.clone());
        assert!(actions.restore_backup(&context).await.is_err());

        assert_eq!(progress(&controller).await, 30.0);
        assert_eq!(controller.intent().await, Some(intent));
        let stored = controller.store().load_active().await.unwrap().unwrap();
        assert_eq!(stored.current_progress, 30.0);
    }

    #[tokio::test]
    async fn test_reset_keeps_a_quest_in_progress() {
        let controller = controller();
        controller.accept_quest(draft()).await.unwrap();
        walk(&controller, 2_000).await;
        let intent = controller.intent().await.unwrap();

        let actions = SlotRecovery::new(controller.clone());
        let context = RecoveryContext::new("save quest").with_intent(intent);
        assert!(actions.reset_state(&context).await.is_err());

        assert_eq!(controller.state().await, QuestState::InProgress);
        assert_eq!(progress(&controller).await, 20.0);
        assert!(controller.store().load_active().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reset_clears_a_completed_slot() {
        let controller = controller();
        controller.accept_quest(draft()).await.unwrap();
        controller.complete_quest(ClassModifier::UNMODIFIED).await.unwrap();

        let actions = SlotRecovery::new(controller.clone());
        actions
            .reset_state(&RecoveryContext::new("load quest"))
            .await
            .unwrap();

        assert_eq!(controller.state().await, QuestState::NotStarted);
        assert!(controller.store().load_active().await.unwrap().is_none());
    }
}
