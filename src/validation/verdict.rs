use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::Severity;

/// Every field the validator knows how to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Steps,
    StandHours,
    HeartRate,
    ExerciseMinutes,
    MindfulMinutes,
    QuestDistance,
    QuestProgress,
    QuestTitle,
    QuestDescription,
    XpReward,
    GoldReward,
    EncounterThreshold,
    ProgressTransition,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Steps => "steps",
            Field::StandHours => "standHours",
            Field::HeartRate => "heartRate",
            Field::ExerciseMinutes => "exerciseMinutes",
            Field::MindfulMinutes => "mindfulMinutes",
            Field::QuestDistance => "totalProgress",
            Field::QuestProgress => "currentProgress",
            Field::QuestTitle => "title",
            Field::QuestDescription => "description",
            Field::XpReward => "xpReward",
            Field::GoldReward => "goldReward",
            Field::EncounterThreshold => "encounterThreshold",
            Field::ProgressTransition => "progressTransition",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw value was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub field: Field,
    /// Offending value, rendered for logs.
    pub value: String,
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    pub fn new(
        field: Field,
        value: impl ToString,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field,
            value: value.to_string(),
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rejected value {} ({}): {}",
            self.field, self.value, self.severity, self.message
        )
    }
}

/// Result of a single field check.
pub type Verdict<T> = Result<T, Violation>;
