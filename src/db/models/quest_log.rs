use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuestOutcome {
    Completed,
    Cancelled,
}

impl QuestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestOutcome::Completed => "Completed",
            QuestOutcome::Cancelled => "Cancelled",
        }
    }
}

/// A quest that left the slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestLogEntry {
    pub quest_id: String,
    pub title: String,
    pub outcome: QuestOutcome,
    pub progress: f64,
    pub total: f64,
    /// Rewards granted; zero for cancelled quests.
    pub xp: u64,
    pub gold: u64,
    pub closed_at: DateTime<Utc>,
}
