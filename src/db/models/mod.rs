pub mod quest_log;

pub use quest_log::{QuestLogEntry, QuestOutcome};
