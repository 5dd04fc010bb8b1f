//! Persisted backend settings and the provider seam read by the request client
//!
//! The settings surface writes the backend address and secret under two
//! well-known keys. The request client never keeps a copy: it asks its
//! [`ConfigProvider`] again for every request, so an address or key change
//! takes effect on the next call.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Storage key for the backend base address
pub const BACKEND_ADDRESS_KEY: &str = "backend_address";
/// Storage key for the API secret
pub const SECRET_KEY_KEY: &str = "api_secret_key";
/// Address used when no address has been stored
pub const DEFAULT_BACKEND_ADDRESS: &str = "http://localhost:8000";

/// Where and how to reach the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_address: String,
    pub secret_key: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BACKEND_ADDRESS.to_string(),
            secret_key: String::new(),
        }
    }
}

impl BackendConfig {
    pub fn new(base_address: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_address: base_address.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn has_secret(&self) -> bool {
        !self.secret_key.is_empty()
    }

    fn from_entries(entries: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            base_address: entries
                .get(BACKEND_ADDRESS_KEY)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or(defaults.base_address),
            secret_key: entries.get(SECRET_KEY_KEY).cloned().unwrap_or_default(),
        }
    }
}

/// Read-only view of the current backend settings
#[cfg_attr(test, mockall::automock)]
pub trait ConfigProvider: Send + Sync {
    /// Current settings. Called once per request; must not be cached.
    fn backend(&self) -> BackendConfig;
}

/// In-memory settings, writable at runtime
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: RwLock<BackendConfig>,
}

impl MemorySettings {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    pub fn set_base_address(&self, address: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.base_address = address.into();
    }

    pub fn set_secret_key(&self, secret: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.secret_key = secret.into();
    }

    pub fn clear_secret_key(&self) {
        self.set_secret_key(String::new());
    }
}

impl ConfigProvider for MemorySettings {
    fn backend(&self) -> BackendConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Durable key/value settings stored as a flat JSON object on disk
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> crate::Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write one key, keeping any other keys already in the file
    pub fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        tracing::debug!("Stored setting '{}' in {:?}", key, self.path);
        Ok(())
    }

    /// Remove one key. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> crate::Result<()> {
        let mut entries = self.read_entries().unwrap_or_default();
        if entries.remove(key).is_some() {
            std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
            tracing::debug!("Removed setting '{}' from {:?}", key, self.path);
        }
        Ok(())
    }
}

impl ConfigProvider for FileSettingsStore {
    fn backend(&self) -> BackendConfig {
        match self.read_entries() {
            Ok(entries) => BackendConfig::from_entries(&entries),
            Err(e) => {
                tracing::debug!(
                    "Unreadable settings file {:?}, using defaults: {}",
                    self.path,
                    e
                );
                BackendConfig::default()
            }
        }
    }
}
