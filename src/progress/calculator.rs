use crate::models::{ClassModifier, QuestKind, TelemetrySnapshot};

use super::config::CalculatorConfig;

/// Steps converted to distance units, before any class modifier.
pub fn base_distance(snapshot: &TelemetrySnapshot, config: &CalculatorConfig) -> f64 {
    snapshot.steps() as f64 / config.effective_steps_per_unit()
}

/// Distance quests: steps ÷ steps-per-unit × class distance modifier.
pub fn distance_delta(
    snapshot: &TelemetrySnapshot,
    modifier: ClassModifier,
    config: &CalculatorConfig,
) -> f64 {
    base_distance(snapshot, config) * modifier.distance()
}

/// Activity quests: weighted sum of step units, stand hours and exercise
/// minutes, then the class distance modifier.
pub fn activity_delta(
    snapshot: &TelemetrySnapshot,
    modifier: ClassModifier,
    config: &CalculatorConfig,
) -> f64 {
    let weighted = config.weight_steps * base_distance(snapshot, config)
        + config.weight_stand_hours * snapshot.stand_hours() as f64
        + config.weight_exercise_minutes * snapshot.exercise_minutes() as f64;
    weighted.max(0.0) * modifier.distance()
}

/// Progress a snapshot is worth for a quest of the given kind.
///
/// Pure and deterministic: replaying the same snapshot gives the same delta.
pub fn progress(
    snapshot: &TelemetrySnapshot,
    modifier: ClassModifier,
    kind: QuestKind,
    config: &CalculatorConfig,
) -> f64 {
    match kind {
        QuestKind::Distance => distance_delta(snapshot, modifier, config),
        QuestKind::Activity => activity_delta(snapshot, modifier, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CharacterClass, RawTelemetry};

    fn scenario_snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot::from_raw(RawTelemetry {
            steps: 12_000,
            stand_hours: 10,
            heart_rate: 80.0,
            exercise_minutes: 30,
            mindful_minutes: 5,
        })
        .snapshot
    }

    #[test]
    fn test_base_distance_uses_steps_per_unit() {
        let config = CalculatorConfig::default();
        assert!((base_distance(&scenario_snapshot(), &config) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_delta_applies_class_modifier() {
        let config = CalculatorConfig::default();
        let monk = ClassModifier::new(1.1, 1.0).unwrap();
        let delta = distance_delta(&scenario_snapshot(), monk, &config);
        assert!((delta - 132.0).abs() < 1e-9);

        let plain = distance_delta(&scenario_snapshot(), ClassModifier::UNMODIFIED, &config);
        assert!((plain - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_delta_weights_each_metric() {
        let config = CalculatorConfig::default();
        // 120 * 1.0 + 10 * 2.0 + 30 * 0.5 = 155
        let delta = activity_delta(&scenario_snapshot(), ClassModifier::UNMODIFIED, &config);
        assert!((delta - 155.0).abs() < 1e-9);

        let ranger = CharacterClass::Ranger.modifier();
        let boosted = progress(&scenario_snapshot(), ranger, QuestKind::Activity, &config);
        assert!((boosted - 155.0 * 1.33).abs() < 1e-9);
    }

    #[test]
    fn test_progress_is_replayable() {
        let config = CalculatorConfig::default();
        let snapshot = scenario_snapshot();
        let modifier = CharacterClass::Rogue.modifier();
        let first = progress(&snapshot, modifier, QuestKind::Distance, &config);
        let second = progress(&snapshot, modifier, QuestKind::Distance, &config);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_broken_divisor_falls_back() {
        let config = CalculatorConfig {
            steps_per_unit: 0.0,
            ..CalculatorConfig::default()
        };
        let delta = distance_delta(&scenario_snapshot(), ClassModifier::UNMODIFIED, &config);
        assert!((delta - 120.0).abs() < 1e-9);
    }
}
