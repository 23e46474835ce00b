//! Quest record and its persisted layout.
//!
//! `QuestRecord` keeps its invariants behind setters: progress never
//! decreases, completion is one-way, and a completed quest always has
//! `current_progress >= total_progress`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Severity;
use crate::validation::{
    rules::report, validate_distance, validate_progress, validate_progress_transition,
    validate_reward, validate_text, Field, ProgressRules, Verdict, Violation,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// How telemetry turns into progress for a quest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestKind {
    /// Steps converted to distance.
    #[default]
    Distance,
    /// Weighted mix of steps, standing and exercise.
    Activity,
}

/// A point along the quest where something happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub name: String,
    pub at_progress: f64,
}

/// Caller-supplied values for a new quest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestDraft {
    pub title: String,
    pub description: String,
    pub total_progress: f64,
    pub xp_reward: i64,
    pub gold_reward: i64,
    #[serde(default)]
    pub kind: QuestKind,
    #[serde(default)]
    pub encounters: Vec<Encounter>,
}

/// Quest fields as written by the storage collaborator. Never trusted on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuest {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub kind: QuestKind,
    pub total_progress: f64,
    pub current_progress: f64,
    pub is_completed: bool,
    pub xp_reward: i64,
    pub gold_reward: i64,
    #[serde(default)]
    pub encounters: Vec<Encounter>,
    pub accepted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestRecord {
    id: String,
    title: String,
    description: String,
    kind: QuestKind,
    total_progress: f64,
    current_progress: f64,
    is_completed: bool,
    xp_reward: u64,
    gold_reward: u64,
    encounters: Vec<Encounter>,
    accepted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

/// A record rebuilt from storage, with whatever had to be fixed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedQuest {
    pub record: QuestRecord,
    pub corrections: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Advanced {
        progress: f64,
        encounters: Vec<Encounter>,
    },
    AutoCompleted {
        progress: f64,
        encounters: Vec<Encounter>,
    },
    AlreadyComplete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionOutcome {
    Completed,
    /// Progress was short of the total and got raised to it.
    CompletedWithCorrection { raised_from: f64 },
    AlreadyComplete,
}

fn check_encounters(encounters: Vec<Encounter>, total: f64) -> (Vec<Encounter>, Vec<Violation>) {
    let mut kept = Vec::with_capacity(encounters.len());
    let mut rejected = Vec::new();
    for encounter in encounters {
        let valid = encounter.at_progress.is_finite()
            && encounter.at_progress > 0.0
            && encounter.at_progress <= total;
        if valid {
            kept.push(encounter);
        } else {
            let violation = Violation::new(
                Field::EncounterThreshold,
                encounter.at_progress,
                Severity::Medium,
                format!("encounter '{}' must sit within (0, {total}]", encounter.name),
            );
            report(&violation);
            rejected.push(violation);
        }
    }
    kept.sort_by(|a, b| a.at_progress.total_cmp(&b.at_progress));
    (kept, rejected)
}

impl QuestRecord {
    /// Build a fresh quest. Any invalid field refuses the whole draft.
    pub fn new(draft: QuestDraft) -> Result<Self, Vec<Violation>> {
        let mut violations = Vec::new();

        let title = validate_text(Field::QuestTitle, &draft.title);
        let description = validate_text(Field::QuestDescription, &draft.description);
        let total = validate_distance(draft.total_progress);
        let xp = validate_reward(Field::XpReward, draft.xp_reward);
        let gold = validate_reward(Field::GoldReward, draft.gold_reward);

        let (title, description, total, xp, gold) = match (title, description, total, xp, gold) {
            (Ok(t), Ok(d), Ok(total), Ok(xp), Ok(gold)) => (t, d, total, xp, gold),
            (t, d, total, xp, gold) => {
                violations.extend(t.err());
                violations.extend(d.err());
                violations.extend(total.err());
                violations.extend(xp.err());
                violations.extend(gold.err());
                return Err(violations);
            }
        };

        let (encounters, rejected) = check_encounters(draft.encounters, total);
        if !rejected.is_empty() {
            return Err(rejected);
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            kind: draft.kind,
            total_progress: total,
            current_progress: 0.0,
            is_completed: false,
            xp_reward: xp,
            gold_reward: gold,
            encounters,
            accepted_at: Utc::now(),
            completed_at: None,
        })
    }

    /// Rebuild a record from storage, re-running every check.
    ///
    /// Title, description and total are structural: if any is invalid the
    /// load is refused. Progress, rewards and encounters are repaired, and a
    /// completed quest below its total is raised to the total.
    pub fn from_stored(stored: StoredQuest) -> Result<LoadedQuest, Vec<Violation>> {
        let title = validate_text(Field::QuestTitle, &stored.title);
        let description = validate_text(Field::QuestDescription, &stored.description);
        let total = validate_distance(stored.total_progress);

        let (title, description, total) = match (title, description, total) {
            (Ok(t), Ok(d), Ok(total)) => (t, d, total),
            (t, d, total) => {
                let mut violations = Vec::new();
                violations.extend(t.err());
                violations.extend(d.err());
                violations.extend(total.err());
                return Err(violations);
            }
        };

        let mut corrections = Vec::new();
        let mut current = validate_progress(stored.current_progress).unwrap_or_else(|violation| {
            corrections.push(violation);
            0.0
        });
        let xp = validate_reward(Field::XpReward, stored.xp_reward).unwrap_or_else(|violation| {
            corrections.push(violation);
            0
        });
        let gold =
            validate_reward(Field::GoldReward, stored.gold_reward).unwrap_or_else(|violation| {
                corrections.push(violation);
                0
            });
        let (encounters, dropped) = check_encounters(stored.encounters, total);
        corrections.extend(dropped);

        let mut completed_at = stored.completed_at;
        if stored.is_completed && current < total {
            log_warn!(
                "quest {} stored as completed with progress {}/{}; raising to total",
                stored.id,
                current,
                total
            );
            corrections.push(Violation::new(
                Field::QuestProgress,
                current,
                Severity::Medium,
                "completed quest was below its total and was raised to it",
            ));
            current = total;
        }
        if stored.is_completed && completed_at.is_none() {
            completed_at = Some(Utc::now());
        }
        if !stored.is_completed {
            completed_at = None;
        }

        Ok(LoadedQuest {
            record: Self {
                id: stored.id,
                title,
                description,
                kind: stored.kind,
                total_progress: total,
                current_progress: current,
                is_completed: stored.is_completed,
                xp_reward: xp,
                gold_reward: gold,
                encounters,
                accepted_at: stored.accepted_at,
                completed_at,
            },
            corrections,
        })
    }

    pub fn to_stored(&self) -> StoredQuest {
        StoredQuest {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            kind: self.kind,
            total_progress: self.total_progress,
            current_progress: self.current_progress,
            is_completed: self.is_completed,
            xp_reward: self.xp_reward as i64,
            gold_reward: self.gold_reward as i64,
            encounters: self.encounters.clone(),
            accepted_at: self.accepted_at,
            completed_at: self.completed_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> QuestKind {
        self.kind
    }

    pub fn total_progress(&self) -> f64 {
        self.total_progress
    }

    pub fn current_progress(&self) -> f64 {
        self.current_progress
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn xp_reward(&self) -> u64 {
        self.xp_reward
    }

    pub fn gold_reward(&self) -> u64 {
        self.gold_reward
    }

    pub fn encounters(&self) -> &[Encounter] {
        &self.encounters
    }

    pub fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn remaining(&self) -> f64 {
        (self.total_progress - self.current_progress).max(0.0)
    }

    /// Share of the quest done, capped at 1.0.
    pub fn fraction_complete(&self) -> f64 {
        (self.current_progress / self.total_progress).min(1.0)
    }

    /// Add `delta` to current progress, completing the quest once it reaches
    /// the total.
    pub fn add_progress(&mut self, delta: f64, rules: &ProgressRules) -> Verdict<ProgressUpdate> {
        if self.is_completed {
            log_warn!("quest {} already complete; ignoring progress of {}", self.id, delta);
            return Ok(ProgressUpdate::AlreadyComplete);
        }

        let previous = self.current_progress;
        let proposed = validate_progress_transition(
            previous,
            previous + delta,
            self.total_progress,
            rules,
        )?;

        let crossed: Vec<Encounter> = self
            .encounters
            .iter()
            .filter(|e| e.at_progress > previous && e.at_progress <= proposed)
            .cloned()
            .collect();

        self.current_progress = proposed;

        if self.current_progress >= self.total_progress {
            self.is_completed = true;
            self.completed_at = Some(Utc::now());
            log_info!(
                "quest {} auto-completed at {}/{}",
                self.id,
                self.current_progress,
                self.total_progress
            );
            return Ok(ProgressUpdate::AutoCompleted {
                progress: self.current_progress,
                encounters: crossed,
            });
        }

        Ok(ProgressUpdate::Advanced {
            progress: self.current_progress,
            encounters: crossed,
        })
    }

    /// Mark the quest complete.
    ///
    /// Completing short of the total raises progress to the total.
    pub fn complete(&mut self) -> CompletionOutcome {
        if self.is_completed {
            log_warn!("quest {} already complete; ignoring completion", self.id);
            return CompletionOutcome::AlreadyComplete;
        }

        let outcome = if self.current_progress < self.total_progress {
            log_warn!(
                "quest {} completed with progress {}/{}; raising to total",
                self.id,
                self.current_progress,
                self.total_progress
            );
            let raised_from = self.current_progress;
            self.current_progress = self.total_progress;
            CompletionOutcome::CompletedWithCorrection { raised_from }
        } else {
            CompletionOutcome::Completed
        };

        self.is_completed = true;
        self.completed_at = Some(Utc::now());
        log_info!("quest {} completed", self.id);
        outcome
    }

    pub fn update_title(&mut self, raw: &str) -> Verdict<String> {
        let title = validate_text(Field::QuestTitle, raw)?;
        self.title = title.clone();
        Ok(title)
    }

    pub fn update_description(&mut self, raw: &str) -> Verdict<String> {
        let description = validate_text(Field::QuestDescription, raw)?;
        self.description = description.clone();
        Ok(description)
    }

    /// Replace both rewards, or neither.
    pub fn update_rewards(&mut self, xp: i64, gold: i64) -> Verdict<(u64, u64)> {
        let xp = validate_reward(Field::XpReward, xp)?;
        let gold = validate_reward(Field::GoldReward, gold)?;
        self.xp_reward = xp;
        self.gold_reward = gold;
        Ok((xp, gold))
    }
}
