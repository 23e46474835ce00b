use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::Severity;
use crate::models::{
    ClassModifier, CompletionOutcome, Encounter, ProgressUpdate, QuestDraft, QuestRecord,
    TelemetrySnapshot,
};
use crate::progress::{self, CalculatorConfig};
use crate::validation::{Field, ProgressRules, Violation};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuestState {
    NotStarted,
    InProgress,
    Completed,
}

impl Default for QuestState {
    fn default() -> Self {
        QuestState::NotStarted
    }
}

impl QuestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestState::NotStarted => "not started",
            QuestState::InProgress => "in progress",
            QuestState::Completed => "completed",
        }
    }
}

/// Identifies the quest a deferred result was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestIntent {
    pub quest_id: String,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    pub xp: u64,
    pub gold: u64,
}

/// A transition the slot accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Accepted {
        quest_id: String,
    },
    Advanced {
        quest_id: String,
        delta: f64,
        progress: f64,
        total: f64,
        encounters: Vec<Encounter>,
    },
    Completed {
        quest_id: String,
        progress: f64,
        total: f64,
        encounters: Vec<Encounter>,
        /// Set when completion had to raise progress to the total.
        raised_from: Option<f64>,
        rewards: Rewards,
    },
    /// The quest was already complete; nothing changed.
    AlreadyComplete,
}

/// Why a transition was refused. The slot is untouched whenever one of these
/// is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionRejected {
    #[error("no active quest")]
    NoActiveQuest,

    #[error("quest {quest_id} is already in progress")]
    QuestAlreadyActive { quest_id: String },

    #[error("quest failed validation with {} violation(s)", .0.len())]
    InvalidQuest(Vec<Violation>),

    #[error("progress update rejected: {0}")]
    InvalidProgress(Violation),

    #[error("result for quest {quest_id} no longer applies")]
    StaleIntent { quest_id: String },
}

/// The player's active-quest slot and its lifecycle.
#[derive(Debug, Clone, Default)]
pub struct QuestSlot {
    state: QuestState,
    quest: Option<QuestRecord>,
    /// Bumped whenever the slot is given a different quest or emptied.
    generation: u64,
}

impl QuestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> QuestState {
        self.state
    }

    pub fn quest(&self) -> Option<&QuestRecord> {
        self.quest.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn intent(&self) -> Option<QuestIntent> {
        self.quest.as_ref().map(|quest| QuestIntent {
            quest_id: quest.id().to_string(),
            generation: self.generation,
        })
    }

    /// Validate a draft and accept it.
    pub fn accept_draft(&mut self, draft: QuestDraft) -> Result<Transition, TransitionRejected> {
        if let Some(active) = self.active_quest_id() {
            return Err(TransitionRejected::QuestAlreadyActive { quest_id: active });
        }
        let record = QuestRecord::new(draft).map_err(TransitionRejected::InvalidQuest)?;
        self.accept(record)
    }

    /// `NotStarted -> InProgress`. A completed quest still in the slot is
    /// replaced.
    pub fn accept(&mut self, record: QuestRecord) -> Result<Transition, TransitionRejected> {
        if let Some(active) = self.active_quest_id() {
            return Err(TransitionRejected::QuestAlreadyActive { quest_id: active });
        }
        if record.is_completed() {
            return Err(TransitionRejected::InvalidQuest(vec![Violation::new(
                Field::QuestProgress,
                record.current_progress(),
                Severity::Medium,
                "cannot accept a quest that is already complete",
            )]));
        }

        let quest_id = record.id().to_string();
        *self = Self {
            state: QuestState::InProgress,
            quest: Some(record),
            generation: self.generation.wrapping_add(1),
        };
        log_info!("quest {} accepted (generation {})", quest_id, self.generation);
        Ok(Transition::Accepted { quest_id })
    }

    /// Put a record loaded from storage into the slot.
    pub fn restore(&mut self, record: QuestRecord) -> QuestState {
        let state = if record.is_completed() {
            QuestState::Completed
        } else {
            QuestState::InProgress
        };
        *self = Self {
            state,
            quest: Some(record),
            generation: self.generation.wrapping_add(1),
        };
        state
    }

    /// `InProgress -> InProgress`, or `InProgress -> Completed` once the
    /// total is reached.
    pub fn advance(
        &mut self,
        delta: f64,
        modifier: ClassModifier,
        rules: &ProgressRules,
    ) -> Result<Transition, TransitionRejected> {
        let state = self.state;
        let quest = match (state, self.quest.as_mut()) {
            (QuestState::NotStarted, _) | (_, None) => {
                return Err(TransitionRejected::NoActiveQuest)
            }
            (QuestState::Completed, Some(quest)) => {
                log_warn!("quest {} already complete; progress update ignored", quest.id());
                return Ok(Transition::AlreadyComplete);
            }
            (QuestState::InProgress, Some(quest)) => quest,
        };

        let update = quest
            .add_progress(delta, rules)
            .map_err(TransitionRejected::InvalidProgress)?;

        match update {
            ProgressUpdate::Advanced { progress, encounters } => Ok(Transition::Advanced {
                quest_id: quest.id().to_string(),
                delta,
                progress,
                total: quest.total_progress(),
                encounters,
            }),
            ProgressUpdate::AutoCompleted { progress, encounters } => {
                let transition = Transition::Completed {
                    quest_id: quest.id().to_string(),
                    progress,
                    total: quest.total_progress(),
                    encounters,
                    raised_from: None,
                    rewards: scaled_rewards(quest, modifier),
                };
                self.state = QuestState::Completed;
                Ok(transition)
            }
            ProgressUpdate::AlreadyComplete => {
                self.state = QuestState::Completed;
                Ok(Transition::AlreadyComplete)
            }
        }
    }

    /// Convert a snapshot into progress and advance.
    pub fn apply_progress(
        &mut self,
        snapshot: &TelemetrySnapshot,
        modifier: ClassModifier,
        config: &CalculatorConfig,
        rules: &ProgressRules,
    ) -> Result<Transition, TransitionRejected> {
        let kind = match (self.state, self.quest.as_ref()) {
            (QuestState::InProgress, Some(quest)) => quest.kind(),
            _ => return self.advance(0.0, modifier, rules),
        };
        let delta = progress::progress(snapshot, modifier, kind, config);
        self.advance(delta, modifier, rules)
    }

    /// Like [`QuestSlot::apply_progress`], but only if `intent` still
    /// describes the quest in the slot.
    pub fn apply_progress_for(
        &mut self,
        intent: &QuestIntent,
        snapshot: &TelemetrySnapshot,
        modifier: ClassModifier,
        config: &CalculatorConfig,
        rules: &ProgressRules,
    ) -> Result<Transition, TransitionRejected> {
        self.check_intent(intent)?;
        self.apply_progress(snapshot, modifier, config, rules)
    }

    /// `Ok` only when the intent matches the in-progress quest.
    pub fn check_intent(&self, intent: &QuestIntent) -> Result<(), TransitionRejected> {
        let current = self.quest.as_ref().map(|quest| quest.id());
        let live = self.state == QuestState::InProgress
            && self.generation == intent.generation
            && current == Some(intent.quest_id.as_str());
        if live {
            Ok(())
        } else {
            log_warn!(
                "discarding deferred result for quest {} (generation {}, slot is {} at generation {})",
                intent.quest_id,
                intent.generation,
                self.state.as_str(),
                self.generation
            );
            Err(TransitionRejected::StaleIntent {
                quest_id: intent.quest_id.clone(),
            })
        }
    }

    /// `InProgress -> Completed` on request.
    pub fn complete(&mut self, modifier: ClassModifier) -> Result<Transition, TransitionRejected> {
        let quest = match (self.state, self.quest.as_mut()) {
            (QuestState::NotStarted, _) | (_, None) => {
                return Err(TransitionRejected::NoActiveQuest)
            }
            (QuestState::Completed, Some(quest)) => {
                log_warn!("quest {} already complete; completion ignored", quest.id());
                return Ok(Transition::AlreadyComplete);
            }
            (QuestState::InProgress, Some(quest)) => quest,
        };

        let raised_from = match quest.complete() {
            CompletionOutcome::AlreadyComplete => {
                self.state = QuestState::Completed;
                return Ok(Transition::AlreadyComplete);
            }
            CompletionOutcome::Completed => None,
            CompletionOutcome::CompletedWithCorrection { raised_from } => Some(raised_from),
        };

        let transition = Transition::Completed {
            quest_id: quest.id().to_string(),
            progress: quest.current_progress(),
            total: quest.total_progress(),
            encounters: Vec::new(),
            raised_from,
            rewards: scaled_rewards(quest, modifier),
        };
        self.state = QuestState::Completed;
        Ok(transition)
    }

    /// Discard whatever quest is in the slot.
    pub fn cancel(&mut self) -> Option<QuestRecord> {
        let quest = self.quest.take();
        if let Some(quest) = &quest {
            log_info!("quest {} removed from slot ({})", quest.id(), self.state.as_str());
        }
        self.state = QuestState::NotStarted;
        self.generation = self.generation.wrapping_add(1);
        quest
    }

    fn active_quest_id(&self) -> Option<String> {
        match (self.state, self.quest.as_ref()) {
            (QuestState::InProgress, Some(quest)) => Some(quest.id().to_string()),
            _ => None,
        }
    }
}

fn scaled_rewards(quest: &QuestRecord, modifier: ClassModifier) -> Rewards {
    Rewards {
        xp: modifier.scale_reward(quest.xp_reward()),
        gold: modifier.scale_reward(quest.gold_reward()),
    }
}
