mod connection;
mod migrations;
mod repositories;

pub mod helpers;
pub mod models;
pub mod store;

pub use connection::Database;
pub use models::{QuestLogEntry, QuestOutcome};
pub use store::QuestStore;
