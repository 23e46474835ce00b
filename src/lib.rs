pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod handling;
pub mod models;
pub mod progress;
pub mod quest;
pub mod recovery;
pub mod sensing;
pub mod utils;
pub mod validation;

pub use config::{ConfigStore, EngineConfig};
pub use db::{Database, QuestLogEntry, QuestOutcome, QuestStore};
pub use engine::QuestEngine;
pub use errors::{ClassifiedError, ErrorCategory, QuestError, Severity};
pub use handling::{ErrorHandler, HandlingDecision, RecoveryOption};
pub use models::{
    CharacterClass, ClassModifier, Encounter, QuestDraft, QuestKind, QuestRecord, RawTelemetry,
    StoredQuest, TelemetrySnapshot, ValidationOutcome,
};
pub use quest::{
    PersistOutcome, ProgressReport, QuestController, QuestIntent, QuestSlot, QuestState,
    Transition, TransitionRejected,
};
pub use recovery::{RecoveryContext, RecoveryManager, RecoveryResult, RecoveryStrategy};
pub use sensing::{SensingController, TelemetrySource};

/// Initialize logging from `RUST_LOG`, defaulting to info. Safe to call more
/// than once.
pub fn init_logging() {
    let initialized = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init()
    .is_ok();

    if initialized {
        log::info!("StrideQuest engine logging initialized");
    }
}
