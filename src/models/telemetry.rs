use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{
    validate_exercise_minutes, validate_heart_rate, validate_mindful_minutes,
    validate_stand_hours, validate_steps, Field, Verdict, Violation,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Activity values as delivered by a sensor, before any checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTelemetry {
    pub steps: i64,
    pub stand_hours: i64,
    pub heart_rate: f64,
    pub exercise_minutes: i64,
    pub mindful_minutes: i64,
}

/// One validated read of activity data.
///
/// Every field satisfies its range check at all times; setters return the
/// verdict and leave the old value in place on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    steps: u64,
    stand_hours: u8,
    heart_rate: f64,
    exercise_minutes: u16,
    mindful_minutes: u16,
    captured_at: DateTime<Utc>,
}

/// Which fields of a raw read made it into the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub snapshot: TelemetrySnapshot,
    pub accepted: Vec<Field>,
    pub rejected: Vec<Violation>,
}

impl ValidationOutcome {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn was_rejected(&self, field: Field) -> bool {
        self.rejected.iter().any(|violation| violation.field == field)
    }
}

fn take<T: Default>(
    verdict: Verdict<T>,
    field: Field,
    accepted: &mut Vec<Field>,
    rejected: &mut Vec<Violation>,
) -> T {
    match verdict {
        Ok(value) => {
            accepted.push(field);
            value
        }
        Err(violation) => {
            rejected.push(violation);
            T::default()
        }
    }
}

impl TelemetrySnapshot {
    /// All-zero snapshot.
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            steps: 0,
            stand_hours: 0,
            heart_rate: 0.0,
            exercise_minutes: 0,
            mindful_minutes: 0,
            captured_at,
        }
    }

    pub fn from_raw(raw: RawTelemetry) -> ValidationOutcome {
        Self::from_raw_at(raw, Utc::now())
    }

    /// Validate every field of `raw`; rejected fields fall back to zero.
    pub fn from_raw_at(raw: RawTelemetry, captured_at: DateTime<Utc>) -> ValidationOutcome {
        let mut accepted = Vec::with_capacity(5);
        let mut rejected = Vec::new();

        let snapshot = Self {
            steps: take(validate_steps(raw.steps), Field::Steps, &mut accepted, &mut rejected),
            stand_hours: take(
                validate_stand_hours(raw.stand_hours),
                Field::StandHours,
                &mut accepted,
                &mut rejected,
            ),
            heart_rate: take(
                validate_heart_rate(raw.heart_rate),
                Field::HeartRate,
                &mut accepted,
                &mut rejected,
            ),
            exercise_minutes: take(
                validate_exercise_minutes(raw.exercise_minutes),
                Field::ExerciseMinutes,
                &mut accepted,
                &mut rejected,
            ),
            mindful_minutes: take(
                validate_mindful_minutes(raw.mindful_minutes),
                Field::MindfulMinutes,
                &mut accepted,
                &mut rejected,
            ),
            captured_at,
        };

        if !rejected.is_empty() {
            let fields: Vec<&str> = rejected.iter().map(|v| v.field.as_str()).collect();
            log_warn!(
                "telemetry read at {} had {} rejected field(s), defaulted to 0: {}",
                captured_at.to_rfc3339(),
                rejected.len(),
                fields.join(", ")
            );
        }

        ValidationOutcome {
            snapshot,
            accepted,
            rejected,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn stand_hours(&self) -> u8 {
        self.stand_hours
    }

    pub fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    pub fn exercise_minutes(&self) -> u16 {
        self.exercise_minutes
    }

    pub fn mindful_minutes(&self) -> u16 {
        self.mindful_minutes
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn update_steps(&mut self, raw: i64) -> Verdict<u64> {
        let value = validate_steps(raw)?;
        self.steps = value;
        Ok(value)
    }

    pub fn update_stand_hours(&mut self, raw: i64) -> Verdict<u8> {
        let value = validate_stand_hours(raw)?;
        self.stand_hours = value;
        Ok(value)
    }

    pub fn update_heart_rate(&mut self, raw: f64) -> Verdict<f64> {
        let value = validate_heart_rate(raw)?;
        self.heart_rate = value;
        Ok(value)
    }

    pub fn update_exercise_minutes(&mut self, raw: i64) -> Verdict<u16> {
        let value = validate_exercise_minutes(raw)?;
        self.exercise_minutes = value;
        Ok(value)
    }

    pub fn update_mindful_minutes(&mut self, raw: i64) -> Verdict<u16> {
        let value = validate_mindful_minutes(raw)?;
        self.mindful_minutes = value;
        Ok(value)
    }

    /// Run every check again against the held values. Never mutates.
    pub fn revalidate(&self) -> Vec<Violation> {
        [
            validate_steps(self.steps as i64).err(),
            validate_stand_hours(self.stand_hours as i64).err(),
            validate_heart_rate(self.heart_rate).err(),
            validate_exercise_minutes(self.exercise_minutes as i64).err(),
            validate_mindful_minutes(self.mindful_minutes as i64).err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn to_raw(&self) -> RawTelemetry {
        RawTelemetry {
            steps: self.steps as i64,
            stand_hours: self.stand_hours as i64,
            heart_rate: self.heart_rate,
            exercise_minutes: self.exercise_minutes as i64,
            mindful_minutes: self.mindful_minutes as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Severity;

    fn sample_raw() -> RawTelemetry {
        RawTelemetry {
            steps: 12_000,
            stand_hours: 10,
            heart_rate: 80.0,
            exercise_minutes: 30,
            mindful_minutes: 5,
        }
    }

    #[test]
    fn test_clean_read_accepts_every_field() {
        let outcome = TelemetrySnapshot::from_raw(sample_raw());
        assert!(outcome.is_clean());
        assert_eq!(outcome.accepted.len(), 5);
        assert_eq!(outcome.snapshot.steps(), 12_000);
        assert_eq!(outcome.snapshot.stand_hours(), 10);
        assert_eq!(outcome.snapshot.mindful_minutes(), 5);
    }

    #[test]
    fn test_invalid_fields_default_to_zero() {
        let raw = RawTelemetry {
            steps: -40,
            heart_rate: 900.0,
            ..sample_raw()
        };
        let outcome = TelemetrySnapshot::from_raw(raw);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(outcome.was_rejected(Field::Steps));
        assert!(outcome.was_rejected(Field::HeartRate));
        assert_eq!(outcome.snapshot.steps(), 0);
        assert_eq!(outcome.snapshot.heart_rate(), 0.0);
        assert_eq!(outcome.snapshot.exercise_minutes(), 30);
    }

    #[test]
    fn test_rejected_heart_rate_keeps_previous_value() {
        let mut snapshot = TelemetrySnapshot::from_raw(sample_raw()).snapshot;
        let err = snapshot.update_heart_rate(300.0).unwrap_err();
        assert_eq!(err.severity, Severity::Medium);
        assert_eq!(snapshot.heart_rate(), 80.0);
        assert_eq!(snapshot.update_heart_rate(95.0), Ok(95.0));
        assert_eq!(snapshot.heart_rate(), 95.0);
    }

    #[test]
    fn test_rejected_setters_never_partially_apply() {
        let mut snapshot = TelemetrySnapshot::from_raw(sample_raw()).snapshot;
        let before = snapshot;
        assert!(snapshot.update_steps(-1).is_err());
        assert!(snapshot.update_stand_hours(30).is_err());
        assert!(snapshot.update_exercise_minutes(2000).is_err());
        assert!(snapshot.update_mindful_minutes(-9).is_err());
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_revalidate_is_idempotent() {
        let snapshot = TelemetrySnapshot::from_raw(sample_raw()).snapshot;
        let copy = snapshot;
        assert!(snapshot.revalidate().is_empty());
        assert!(snapshot.revalidate().is_empty());
        assert_eq!(snapshot, copy);
    }

    #[test]
    fn test_raw_round_trip_through_snapshot() {
        let snapshot = TelemetrySnapshot::from_raw(sample_raw()).snapshot;
        assert_eq!(snapshot.to_raw(), sample_raw());
    }
}
