//! Range predicates for telemetry and quest fields.
//!
//! Each check returns the sanitized value or a [`Violation`]. Rejections are
//! reported to the log here, so callers only decide what to do with the verdict.

use serde::{Deserialize, Serialize};

use crate::errors::Severity;
use crate::log_severity;

use super::verdict::{Field, Verdict, Violation};

pub const MAX_STAND_HOURS: i64 = 24;
pub const MAX_HEART_RATE_BPM: f64 = 250.0;
pub const MAX_DAILY_MINUTES: i64 = 1440;

const DEFAULT_MAX_JUMP_FRACTION: f64 = 0.5;

/// Limits applied to a proposed progress change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressRules {
    /// Largest share of a quest's total that one update may add.
    pub max_jump_fraction: f64,
}

impl Default for ProgressRules {
    fn default() -> Self {
        Self {
            max_jump_fraction: DEFAULT_MAX_JUMP_FRACTION,
        }
    }
}

impl ProgressRules {
    /// Ceiling on a single increase for a quest of `total` length.
    ///
    /// A fraction outside `(0, 1]` falls back to the default.
    pub fn jump_ceiling(&self, total: f64) -> f64 {
        let fraction = if self.max_jump_fraction.is_finite()
            && self.max_jump_fraction > 0.0
            && self.max_jump_fraction <= 1.0
        {
            self.max_jump_fraction
        } else {
            DEFAULT_MAX_JUMP_FRACTION
        };
        total * fraction
    }
}

/// Send a rejection to the log at a level matching its severity.
pub fn report(violation: &Violation) {
    log_severity!(
        violation.severity,
        "validation rejected {}={} severity={}: {}",
        violation.field,
        violation.value,
        violation.severity,
        violation.message
    );
}

/// Log a rejection and hand it back as an error.
pub fn reject<T>(violation: Violation) -> Verdict<T> {
    report(&violation);
    Err(violation)
}

fn non_finite<T>(field: Field, value: f64) -> Verdict<T> {
    reject(Violation::new(
        field,
        value,
        Severity::High,
        "value is not a finite number",
    ))
}

pub fn validate_steps(raw: i64) -> Verdict<u64> {
    if raw < 0 {
        return reject(Violation::new(
            Field::Steps,
            raw,
            Severity::Medium,
            "step count cannot be negative",
        ));
    }
    Ok(raw as u64)
}

pub fn validate_stand_hours(raw: i64) -> Verdict<u8> {
    if !(0..=MAX_STAND_HOURS).contains(&raw) {
        return reject(Violation::new(
            Field::StandHours,
            raw,
            Severity::Medium,
            format!("stand hours must be within 0..={MAX_STAND_HOURS}"),
        ));
    }
    Ok(raw as u8)
}

pub fn validate_heart_rate(raw: f64) -> Verdict<f64> {
    if !raw.is_finite() {
        return non_finite(Field::HeartRate, raw);
    }
    if !(0.0..=MAX_HEART_RATE_BPM).contains(&raw) {
        return reject(Violation::new(
            Field::HeartRate,
            raw,
            Severity::Medium,
            format!("heart rate must be within 0..={MAX_HEART_RATE_BPM} bpm"),
        ));
    }
    Ok(raw)
}

fn validate_minutes(field: Field, raw: i64) -> Verdict<u16> {
    if !(0..=MAX_DAILY_MINUTES).contains(&raw) {
        return reject(Violation::new(
            field,
            raw,
            Severity::Medium,
            format!("minutes must be within 0..={MAX_DAILY_MINUTES}"),
        ));
    }
    Ok(raw as u16)
}

pub fn validate_exercise_minutes(raw: i64) -> Verdict<u16> {
    validate_minutes(Field::ExerciseMinutes, raw)
}

pub fn validate_mindful_minutes(raw: i64) -> Verdict<u16> {
    validate_minutes(Field::MindfulMinutes, raw)
}

/// Total quest length: strictly positive.
pub fn validate_distance(raw: f64) -> Verdict<f64> {
    if !raw.is_finite() {
        return non_finite(Field::QuestDistance, raw);
    }
    if raw <= 0.0 {
        return reject(Violation::new(
            Field::QuestDistance,
            raw,
            Severity::Medium,
            "quest distance must be greater than zero",
        ));
    }
    Ok(raw)
}

pub fn validate_progress(raw: f64) -> Verdict<f64> {
    if !raw.is_finite() {
        return non_finite(Field::QuestProgress, raw);
    }
    if raw < 0.0 {
        return reject(Violation::new(
            Field::QuestProgress,
            raw,
            Severity::Medium,
            "progress cannot be negative",
        ));
    }
    Ok(raw)
}

/// Title or description: non-empty once surrounding whitespace is trimmed.
pub fn validate_text(field: Field, raw: &str) -> Verdict<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return reject(Violation::new(
            field,
            format!("{raw:?}"),
            Severity::Medium,
            "text cannot be empty",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_reward(field: Field, raw: i64) -> Verdict<u64> {
    if raw < 0 {
        return reject(Violation::new(
            field,
            raw,
            Severity::Medium,
            "reward cannot be negative",
        ));
    }
    Ok(raw as u64)
}

/// Check a proposed progress value against the current one.
///
/// Progress may not decrease, and a single step may not add more than
/// [`ProgressRules::jump_ceiling`] of the quest's total.
pub fn validate_progress_transition(
    current: f64,
    proposed: f64,
    total: f64,
    rules: &ProgressRules,
) -> Verdict<f64> {
    if !proposed.is_finite() {
        return non_finite(Field::ProgressTransition, proposed);
    }
    if proposed < current {
        return reject(Violation::new(
            Field::ProgressTransition,
            proposed,
            Severity::Medium,
            format!("progress cannot decrease from {current}"),
        ));
    }
    let ceiling = rules.jump_ceiling(total);
    let increase = proposed - current;
    if increase > ceiling {
        return reject(Violation::new(
            Field::ProgressTransition,
            proposed,
            Severity::Medium,
            format!("increase of {increase} exceeds the per-update ceiling of {ceiling}"),
        ));
    }
    Ok(proposed)
}
