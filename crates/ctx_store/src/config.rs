//! Configuration types for the context store.

use crate::atomic::AtomicWriter;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file under the store root.
pub const CONFIG_FILE: &str = "config.toml";

/// Comprehensive configuration for a context store.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Atomic write and append behaviour.
    #[serde(default)]
    pub write: WriteConfig,

    /// Context id generation.
    #[serde(default)]
    pub ids: IdConfig,

    /// Summary index (L2) settings.
    #[serde(default)]
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from `<root>/config.toml`, falling back to defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| StoreError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| StoreError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `<root>/config.toml` through the atomic writer,
    /// using this config's own write policy.
    pub fn save(&self, root: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::ConfigError(format!("failed to serialize config: {}", e)))?;
        AtomicWriter::new(self.write.clone()).write(&root.join(CONFIG_FILE), content.as_bytes())
    }
}

/// Retry and permission settings for the atomic file writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteConfig {
    /// Retries after the first failed attempt (default: 2).
    pub max_retries: u32,

    /// Delay before each retry in milliseconds (default: [500, 1000]).
    /// The last value is reused when there are more retries than delays.
    pub backoff_ms: Vec<u64>,

    /// Permission bits applied to written files on unix (default: 0o600).
    pub file_mode: u32,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: vec![500, 1000],
            file_mode: 0o600,
        }
    }
}

impl WriteConfig {
    /// A policy that never retries. Used by tests that provoke failures.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: Vec::new(),
            ..Self::default()
        }
    }

    /// Returns the delay to wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let idx = (retry.saturating_sub(1)) as usize;
        let ms = self
            .backoff_ms
            .get(idx)
            .or_else(|| self.backoff_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }
}

/// Context id generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdConfig {
    /// Maximum length of a slug generated from a summary (default: 50).
    pub slug_max_len: usize,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self { slug_max_len: 50 }
    }
}

/// Summary index settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    /// Format version written into index files (default: 1).
    pub version: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { version: 1 }
    }
}
