//! Launcher configuration
//!
//! Handles:
//! - Container name, image and shared volume location
//! - Refresh cadence and history bounds
//! - Auto-update check preferences
//! - Display preferences (theme, debug logging)
//!
//! Stored as TOML in the OS config directory; every field has a default so a
//! partial file (or none at all) is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::charts::{Theme, DEFAULT_CHART_WINDOW};
use crate::telemetry::DEFAULT_MAX_HISTORY_QUEUE;

pub const CONFIG_PATH_ENV: &str = "EDGE_NODE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub container: ContainerConfig,
    pub refresh: RefreshConfig,
    pub update: UpdateConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    /// Host directory bind-mounted into the container
    pub volume_dir: PathBuf,
    /// Where the node expects its local cache inside the container
    pub mount_point: String,
    pub env_file: Option<PathBuf>,
    pub address_file: String,
    pub history_file: String,
    pub command_timeout_secs: u64,
    pub pull_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub max_history_queue: usize,
    pub chart_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub enabled: bool,
    pub check_interval_secs: u64,
    /// Shell command performing the actual check; its last output line may carry the latest version
    pub command: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub theme: Theme,
    pub force_debug: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        let volume_dir = dirs::data_local_dir()
            .map(|dir| dir.join("edge-node-launcher").join("volume"))
            .unwrap_or_else(|| PathBuf::from("_local_cache"));

        Self {
            name: "edge_node_container".to_string(),
            image: "naeural/edge_node:latest".to_string(),
            volume_dir,
            mount_point: "/edge_node/_local_cache/_data".to_string(),
            env_file: None,
            address_file: "local_address.txt".to_string(),
            history_file: "local_history.json".to_string(),
            command_timeout_secs: 30,
            pull_timeout_secs: 900,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_history_queue: DEFAULT_MAX_HISTORY_QUEUE,
            chart_window: DEFAULT_CHART_WINDOW,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 3600,
            command: None,
            timeout_secs: 120,
        }
    }
}

impl LauncherConfig {
    /// Load config from `EDGE_NODE_CONFIG` or the OS-specific location, then apply env overrides
    pub async fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::config_file_path()?,
        };
        let mut config = Self::load_from(&path).await?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit path; a missing file yields the defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Save config to the OS-specific location, returning where it was written
    pub async fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path).await?;
        Ok(path)
    }

    /// Save config to an explicit path, creating parent directories
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("edge-node-launcher");
        path.push("config.toml");
        Ok(path)
    }

    /// Environment overrides, looked up through `lookup` so tests need not touch the process env
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("EDGE_NODE_VOLUME_DIR") {
            self.container.volume_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("EDGE_NODE_CONTAINER") {
            self.container.name = name;
        }
        if let Some(image) = lookup("EDGE_NODE_IMAGE") {
            self.container.image = image;
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs.max(1))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update.check_interval_secs)
    }
}
