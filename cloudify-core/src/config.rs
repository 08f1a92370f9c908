//! Configuration management.

use crate::error::{CloudifyError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Persistent configuration for Cloudify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Container CLI to invoke (e.g. "docker").
    pub compose_command: String,
    /// Compose subcommand passed first (e.g. "compose").
    pub compose_subcommand: String,
    /// Base directory for per-environment compose files.
    pub environments_dir: String,
    /// Timeout applied to every compose invocation, in seconds. Zero disables it.
    pub command_timeout_secs: u64,
    /// Pass --dry-run to the compose CLI instead of mutating containers.
    pub dry_run: bool,
    pub log_level: String,
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compose_command: "docker".to_string(),
            compose_subcommand: "compose".to_string(),
            environments_dir: paths::environments_dir().to_string_lossy().to_string(),
            command_timeout_secs: 300,
            dry_run: false,
            log_level: "info".to_string(),
            data_dir: paths::data_dir().to_string_lossy().to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from disk.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| CloudifyError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| CloudifyError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CloudifyError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| CloudifyError::InvalidConfig {
                reason: format!("Failed to serialize config: {}", e),
            })?;
        std::fs::write(&path, content).map_err(|e| CloudifyError::IoError { path, source: e })
    }

    /// Timeout applied to compose invocations, when configured.
    pub fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs > 0 {
            Some(Duration::from_secs(self.command_timeout_secs))
        } else {
            None
        }
    }
}
