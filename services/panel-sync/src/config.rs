//! Configuration types for the panel-sync service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::RequestTimeouts;
use crate::health::{DEFAULT_HEALTH_ENDPOINT, DEFAULT_HEALTH_INTERVAL};
use crate::resources::ResourceKind;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Key/value file holding the backend address and secret
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            timeouts: TimeoutConfig::default(),
            health: HealthConfig::default(),
            resources: default_resources(),
        }
    }
}

/// Request timeouts per call class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_data_timeout_ms")]
    pub data_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            data_timeout_ms: default_data_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn to_timeouts(&self) -> RequestTimeouts {
        RequestTimeouts {
            data: Duration::from_millis(self.data_timeout_ms),
            probe: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

/// Health probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_health_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_health_interval")]
    pub interval_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_health_endpoint(),
            interval_seconds: default_health_interval(),
        }
    }
}

/// A polled resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: ResourceKind,
    /// Overrides the resource's default interval
    #[serde(default)]
    pub polling_interval_seconds: Option<u64>,
}

impl ResourceConfig {
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.kind.default_interval())
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("panel-sync-settings.json")
}

fn default_data_timeout_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_health_endpoint() -> String {
    DEFAULT_HEALTH_ENDPOINT.to_string()
}

fn default_health_interval() -> u64 {
    DEFAULT_HEALTH_INTERVAL.as_secs()
}

fn default_resources() -> Vec<ResourceConfig> {
    [
        ResourceKind::Servers,
        ResourceKind::Queue,
        ResourceKind::Monitors,
        ResourceKind::Account,
    ]
    .into_iter()
    .map(|kind| ResourceConfig {
        kind,
        polling_interval_seconds: None,
    })
    .collect()
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::SyncError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
