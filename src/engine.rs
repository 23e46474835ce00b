use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::{
    config::{ConfigStore, EngineConfig},
    db::Database,
    models::ClassModifier,
    quest::{QuestController, RestoreReport},
    sensing::{SensingController, SensingSummary, TelemetrySource},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const DB_FILE: &str = "stridequest.sqlite3";
pub const CONFIG_FILE: &str = "config.json";

/// Everything a host app needs, wired from one data directory.
pub struct QuestEngine {
    pub config: ConfigStore,
    pub db: Database,
    pub quests: QuestController,
    sensing: Mutex<SensingController>,
}

impl QuestEngine {
    /// Open config and database under `data_dir` and restore the active
    /// quest. A quest that cannot be restored is left in storage and the
    /// engine starts with an empty slot.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = ConfigStore::new(data_dir.join(CONFIG_FILE))?;
        let db = Database::new(data_dir.join(DB_FILE))?;
        let engine = Self::with_parts(config, db);

        match engine.quests.restore_active().await {
            Ok(RestoreReport {
                quest_id: Some(id),
                state,
                ..
            }) => log_info!("restored quest {} ({})", id, state.as_str()),
            Ok(_) => {}
            Err(err) => log_warn!("could not restore active quest: {}", err),
        }

        Ok(engine)
    }

    pub fn with_parts(config: ConfigStore, db: Database) -> Self {
        let effective: EngineConfig = config.effective();
        let quests = QuestController::new(&effective, Arc::new(db.clone()));
        Self {
            config,
            db,
            quests,
            sensing: Mutex::new(SensingController::new()),
        }
    }

    pub async fn start_sensing(
        &self,
        source: Arc<dyn TelemetrySource>,
        modifier: ClassModifier,
    ) -> Result<()> {
        let sensing_config = self.config.effective().sensing;
        self.sensing
            .lock()
            .await
            .start_sensing(self.quests.clone(), source, modifier, sensing_config)
    }

    pub async fn stop_sensing(&self) -> Result<Option<SensingSummary>> {
        self.sensing.lock().await.stop_sensing().await
    }

    pub async fn is_sensing(&self) -> bool {
        self.sensing.lock().await.is_active()
    }
}
