#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use stridequest::handling::TierPolicy;
use stridequest::{
    Database, EngineConfig, QuestDraft, QuestError, QuestKind, QuestLogEntry, QuestStore,
    RawTelemetry, StoredQuest, TelemetrySource,
};

/// Defaults with millisecond retry delays.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    for tier in [
        &mut config.handler.high,
        &mut config.handler.medium,
        &mut config.handler.low,
    ] {
        *tier = TierPolicy {
            max_retries: tier.max_retries,
            base_delay_ms: 1,
            multiplier: 2.0,
            max_delay_ms: 4,
        };
    }
    config.recovery.retry_delay_ms = 0;
    config.sensing.poll_interval_ms = 5;
    config.sensing.read_timeout_ms = 50;
    config
}

pub fn distance_draft(total: f64) -> QuestDraft {
    QuestDraft {
        title: "The Long Road".into(),
        description: "Walk to the next town".into(),
        total_progress: total,
        xp_reward: 120,
        gold_reward: 30,
        kind: QuestKind::Distance,
        encounters: Vec::new(),
    }
}

pub fn steps(count: i64) -> RawTelemetry {
    RawTelemetry {
        steps: count,
        ..RawTelemetry::default()
    }
}

/// In-memory SQLite store whose saves fail while `failing_saves` is non-zero.
pub struct FlakyStore {
    inner: Database,
    failing_saves: AtomicU32,
    pub save_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(failing_saves: u32) -> Self {
        Self {
            inner: Database::open_in_memory().expect("in-memory database"),
            failing_saves: AtomicU32::new(failing_saves),
            save_calls: AtomicU32::new(0),
        }
    }

    pub fn set_failing(&self, count: u32) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn saves(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QuestStore for FlakyStore {
    async fn save_active(&self, quest: &StoredQuest) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            bail!("storage device busy");
        }
        self.inner.save_active(quest).await
    }

    async fn load_active(&self) -> Result<Option<StoredQuest>> {
        self.inner.load_active().await
    }

    async fn clear_active(&self) -> Result<()> {
        self.inner.clear_active().await
    }

    async fn load_backup(&self, quest_id: Option<&str>) -> Result<Option<StoredQuest>> {
        self.inner.load_backup(quest_id).await
    }

    async fn append_log(&self, entry: &QuestLogEntry) -> Result<()> {
        self.inner.append_log(entry).await
    }

    async fn quest_log(&self, limit: usize) -> Result<Vec<QuestLogEntry>> {
        self.inner.quest_log(limit).await
    }
}

/// Replays a fixed list of reads, then reports zero activity.
pub struct ScriptedSource {
    reads: Mutex<VecDeque<Result<RawTelemetry, QuestError>>>,
    grant_access: bool,
}

impl ScriptedSource {
    pub fn new(reads: Vec<Result<RawTelemetry, QuestError>>) -> Self {
        Self {
            reads: Mutex::new(reads.into()),
            grant_access: false,
        }
    }

    pub fn granting_access(mut self) -> Self {
        self.grant_access = true;
        self
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn read(&self) -> Result<RawTelemetry, QuestError> {
        self.reads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawTelemetry::default()))
    }

    async fn request_access(&self) -> Result<bool, QuestError> {
        Ok(self.grant_access)
    }
}
