pub mod rules;
pub mod verdict;

pub use rules::{
    validate_distance, validate_exercise_minutes, validate_heart_rate, validate_mindful_minutes,
    validate_progress, validate_progress_transition, validate_reward, validate_stand_hours,
    validate_steps, validate_text, ProgressRules,
};
pub use verdict::{Field, Verdict, Violation};
