pub mod severity;
pub mod taxonomy;

pub use severity::Severity;
pub use taxonomy::{ClassifiedError, ErrorCategory, QuestError};
