use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::handling::HandlerConfig;
use crate::progress::CalculatorConfig;
use crate::recovery::RecoveryConfig;
use crate::sensing::SensingConfig;
use crate::validation::ProgressRules;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Environment switch for faster polling while developing.
pub const DEBUG_ENV: &str = "STRIDEQUEST_DEBUG";

/// Every tunable of the engine. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub calculator: CalculatorConfig,
    pub rules: ProgressRules,
    pub handler: HandlerConfig,
    pub recovery: RecoveryConfig,
    pub sensing: SensingConfig,
}

impl EngineConfig {
    /// Apply `STRIDEQUEST_DEBUG`.
    pub fn with_env_overrides(mut self) -> Self {
        if debug_mode() {
            self.sensing.poll_interval_ms = self.sensing.debug_poll_interval_ms;
        }
        self
    }
}

pub fn debug_mode() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// JSON-file backed configuration.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<EngineConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            parse_or_default(&contents, &path)
        } else {
            EngineConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// The file contents as loaded, without environment overrides.
    pub fn get(&self) -> EngineConfig {
        self.read().clone()
    }

    pub fn effective(&self) -> EngineConfig {
        self.get().with_env_overrides()
    }

    pub fn update(&self, config: EngineConfig) -> Result<()> {
        let mut guard = self.write();
        *guard = config;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {}", self.path.display()))?;
        let data: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed config in {}", self.path.display()))?;
        *self.write() = data;
        log_info!("config reloaded from {}", self.path.display());
        Ok(())
    }

    fn persist(&self, data: &EngineConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineConfig> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineConfig> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_or_default(contents: &str, path: &std::path::Path) -> EngineConfig {
    match serde_json::from_str(contents) {
        Ok(config) => config,
        Err(err) => {
            log_warn!(
                "ignoring malformed config at {} ({}); using defaults",
                path.display(),
                err
            );
            EngineConfig::default()
        }
    }
}
