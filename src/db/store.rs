use anyhow::Result;
use async_trait::async_trait;

use crate::models::StoredQuest;

use super::connection::Database;
use super::models::QuestLogEntry;

/// Persistence seam for the active quest and the quest log.
///
/// Implementations report plumbing failures as `anyhow` errors; a payload
/// that no longer decodes should surface a `serde_json::Error` in the chain so
/// callers can tell corruption apart from an unreachable store.
#[async_trait]
pub trait QuestStore: Send + Sync {
    async fn save_active(&self, quest: &StoredQuest) -> Result<()>;

    async fn load_active(&self) -> Result<Option<StoredQuest>>;

    async fn clear_active(&self) -> Result<()>;

    /// Most recent readable copy of an earlier active quest.
    async fn load_backup(&self, quest_id: Option<&str>) -> Result<Option<StoredQuest>>;

    async fn append_log(&self, entry: &QuestLogEntry) -> Result<()>;

    async fn quest_log(&self, limit: usize) -> Result<Vec<QuestLogEntry>>;
}

#[async_trait]
impl QuestStore for Database {
    async fn save_active(&self, quest: &StoredQuest) -> Result<()> {
        self.save_active_quest(quest).await
    }

    async fn load_active(&self) -> Result<Option<StoredQuest>> {
        self.load_active_quest().await
    }

    async fn clear_active(&self) -> Result<()> {
        self.clear_active_quest().await
    }

    async fn load_backup(&self, quest_id: Option<&str>) -> Result<Option<StoredQuest>> {
        self.latest_quest_backup(quest_id).await
    }

    async fn append_log(&self, entry: &QuestLogEntry) -> Result<()> {
        self.insert_quest_log_entry(entry).await
    }

    async fn quest_log(&self, limit: usize) -> Result<Vec<QuestLogEntry>> {
        self.get_quest_log(limit).await
    }
}
