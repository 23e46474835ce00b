use serde::{Deserialize, Serialize};

/// Tunable constants for turning telemetry into quest progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalculatorConfig {
    /// Steps that make up one distance unit
    pub steps_per_unit: f64,

    /// Activity-quest weights, applied before the class modifier
    pub weight_steps: f64,
    pub weight_stand_hours: f64,
    pub weight_exercise_minutes: f64,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            steps_per_unit: 100.0,
            weight_steps: 1.0,
            weight_stand_hours: 2.0,
            weight_exercise_minutes: 0.5,
        }
    }
}

impl CalculatorConfig {
    /// Steps-per-unit divisor, falling back to the default when unusable.
    pub fn effective_steps_per_unit(&self) -> f64 {
        if self.steps_per_unit.is_finite() && self.steps_per_unit > 0.0 {
            self.steps_per_unit
        } else {
            Self::default().steps_per_unit
        }
    }
}
