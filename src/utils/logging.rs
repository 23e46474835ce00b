//! Conditional logging macros that check a module-level `ENABLE_LOGS` flag,
//! plus the severity-to-level mapping used when reporting rejected values.
//!
//! Usage:
//! ```ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("This will log if ENABLE_LOGS is true");
//! ```

use crate::errors::Severity;

/// Macro for conditional debug logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Macro for conditional info logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Macro for conditional warn logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Macro for conditional error logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Macro for logging at a level picked from a [`Severity`](crate::errors::Severity).
/// Ignores `ENABLE_LOGS`: severity-tagged events are always reported.
#[macro_export]
macro_rules! log_severity {
    ($severity:expr, $($arg:tt)*) => {
        log::log!($crate::utils::logging::level_for($severity), $($arg)*);
    };
}

/// Log level a severity is reported at.
pub fn level_for(severity: Severity) -> log::Level {
    match severity {
        Severity::Low => log::Level::Debug,
        Severity::Medium => log::Level::Warn,
        Severity::High | Severity::Critical => log::Level::Error,
    }
}
