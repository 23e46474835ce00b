pub mod handler;
pub mod ledger;
pub mod policy;
pub mod retry;

pub use handler::{ErrorHandler, HandlingDecision, RecoveryOption};
pub use ledger::{AttemptLedger, RecoveryAttempt};
pub use policy::{HandlerConfig, TierPolicy};
pub use retry::{run_with_retry, Escalation};
