use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::connection::Database;
use crate::models::StoredQuest;

/// Older backups beyond this many are pruned on save.
const MAX_BACKUPS: i64 = 10;

fn decode(payload: &str) -> Result<StoredQuest> {
    serde_json::from_str(payload).context("stored quest payload is not valid")
}

impl Database {
    /// Replace the active quest, keeping the previous payload as a backup.
    pub async fn save_active_quest(&self, quest: &StoredQuest) -> Result<()> {
        let quest_id = quest.id.clone();
        let payload = serde_json::to_string(quest).context("failed to encode quest")?;
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO quest_backups (quest_id, payload, backed_up_at)
                 SELECT quest_id, payload, ?1 FROM active_quest WHERE slot = 1",
                params![now],
            )?;
            tx.execute(
                "DELETE FROM quest_backups
                 WHERE id NOT IN (SELECT id FROM quest_backups ORDER BY id DESC LIMIT ?1)",
                params![MAX_BACKUPS],
            )?;
            tx.execute(
                "INSERT INTO active_quest (slot, quest_id, payload, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(slot) DO UPDATE SET
                     quest_id = excluded.quest_id,
                     payload = excluded.payload,
                     updated_at = excluded.updated_at",
                params![quest_id, payload, now],
            )?;

            tx.commit().context("failed to commit active quest")?;
            Ok(())
        })
        .await
    }

    pub async fn load_active_quest(&self) -> Result<Option<StoredQuest>> {
        let payload: Option<String> = self
            .execute(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT payload FROM active_quest WHERE slot = 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        payload.as_deref().map(decode).transpose()
    }

    /// Remove the active quest. Its last payload stays in the backups.
    pub async fn clear_active_quest(&self) -> Result<()> {
        self.execute(|conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO quest_backups (quest_id, payload, backed_up_at)
                 SELECT quest_id, payload, ?1 FROM active_quest WHERE slot = 1",
                params![now],
            )?;
            tx.execute("DELETE FROM active_quest WHERE slot = 1", [])?;
            tx.commit().context("failed to clear active quest")?;
            Ok(())
        })
        .await
    }

    /// Newest backup that still decodes, optionally for one quest.
    pub async fn latest_quest_backup(&self, quest_id: Option<&str>) -> Result<Option<StoredQuest>> {
        let quest_id = quest_id.map(str::to_string);
        let payloads: Vec<String> = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT payload FROM quest_backups
                     WHERE ?1 IS NULL OR quest_id = ?1
                     ORDER BY id DESC",
                )?;
                let rows = stmt.query_map(params![quest_id], |row| row.get::<_, String>(0))?;
                let mut payloads = Vec::new();
                for row in rows {
                    payloads.push(row?);
                }
                Ok(payloads)
            })
            .await?;

        Ok(payloads.iter().find_map(|payload| decode(payload).ok()))
    }
}
