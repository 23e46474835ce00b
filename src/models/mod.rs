pub mod class;
pub mod quest;
pub mod telemetry;

pub use class::{CharacterClass, ClassModifier};
pub use quest::{
    CompletionOutcome, Encounter, LoadedQuest, ProgressUpdate, QuestDraft, QuestKind, QuestRecord,
    StoredQuest,
};
pub use telemetry::{RawTelemetry, TelemetrySnapshot, ValidationOutcome};
