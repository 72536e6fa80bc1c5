//! Application configuration, read from `~/.mindnet/config.toml`.

use anyhow::{Context, Result};
use mindnet_core::CognitionConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Identity ────────────────────────────────────────────────────

/// Default config directory name under `$HOME`.
pub const APP_DIR_NAME: &str = ".mindnet";

pub const CONFIG_FILE_NAME: &str = "config.toml";

// ── Config ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Directory holding one sub-directory per identity. `~` and `$VARS` are expanded.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
    /// Log level when `RUST_LOG` is unset: error, warn, info, debug or trace.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Per-identity write lock behaviour.
    #[serde(default)]
    pub lock: LockConfig,
    /// Recall and consolidation tunables.
    #[serde(default)]
    pub cognition: CognitionConfig,
}

/// Retry policy for the per-identity write lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LockConfig {
    /// Attempts before giving up with a concurrency conflict.
    #[serde(default = "default_lock_retries")]
    pub retries: u32,
    /// First backoff delay in milliseconds; doubles on each retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retries: default_lock_retries(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            log_level: default_log_level(),
            lock: LockConfig::default(),
            cognition: CognitionConfig::default(),
        }
    }
}

fn default_store_dir() -> String {
    format!("~/{APP_DIR_NAME}/networks")
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_lock_retries() -> u32 {
    8
}
fn default_backoff_ms() -> u64 {
    10
}
fn default_max_backoff_ms() -> u64 {
    500
}

impl Config {
    /// `~/.mindnet/config.toml`, if a home directory can be found.
    pub fn default_path() -> Option<PathBuf> {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from the default location. An explicit path must
    /// exist; a missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let content = fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// The store directory with `~` and environment variables expanded.
    /// Unknown variables are left as written.
    pub fn store_path(&self) -> PathBuf {
        let expanded = shellexpand::full(&self.store_dir)
            .unwrap_or_else(|_| shellexpand::tilde(&self.store_dir));
        PathBuf::from(expanded.as_ref())
    }

    /// JSON Schema of the config file.
    pub fn json_schema() -> Result<String> {
        let schema = schemars::schema_for!(Config);
        serde_json::to_string_pretty(&schema).context("Failed to serialize config schema")
    }
}
