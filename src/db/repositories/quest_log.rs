use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_outcome, to_i64, to_u64},
    models::QuestLogEntry,
};

fn row_to_entry(row: &Row) -> Result<QuestLogEntry> {
    let outcome: String = row.get("outcome")?;
    let xp: i64 = row.get("xp")?;
    let gold: i64 = row.get("gold")?;
    let closed_at: String = row.get("closed_at")?;

    Ok(QuestLogEntry {
        quest_id: row.get("quest_id")?,
        title: row.get("title")?,
        outcome: parse_outcome(&outcome)?,
        progress: row.get("progress")?,
        total: row.get("total")?,
        xp: to_u64(xp, "xp")?,
        gold: to_u64(gold, "gold")?,
        closed_at: parse_datetime(&closed_at, "closed_at")?,
    })
}

impl Database {
    pub async fn insert_quest_log_entry(&self, entry: &QuestLogEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO quest_log (quest_id, title, outcome, progress, total, xp, gold, closed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.quest_id,
                    record.title,
                    record.outcome.as_str(),
                    record.progress,
                    record.total,
                    to_i64(record.xp)?,
                    to_i64(record.gold)?,
                    record.closed_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Newest first.
    pub async fn get_quest_log(&self, limit: usize) -> Result<Vec<QuestLogEntry>> {
        let limit = to_i64(limit as u64)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT quest_id, title, outcome, progress, total, xp, gold, closed_at
                 FROM quest_log
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }
}
