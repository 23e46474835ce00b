pub mod controller;
pub mod recovery_actions;
pub mod state;

pub use controller::{
    CancelReport, PersistOutcome, ProgressReport, QuestController, QuestSnapshot, RestoreReport,
};
pub use recovery_actions::SlotRecovery;
pub use state::{QuestIntent, QuestSlot, QuestState, Rewards, Transition, TransitionRejected};
