//! Centralized path configuration for Cloudify.
//!
//! All data paths should go through this module to ensure consistency
//! between invocations, whether running as user or system service.

use std::path::PathBuf;
use uuid::Uuid;

/// Get the Cloudify data directory.
///
/// Resolution order:
/// 1. `CLOUDIFY_DATA_DIR` environment variable
/// 2. `/var/lib/cloudify` if it exists (system install)
/// 3. `~/.cloudify` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLOUDIFY_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/cloudify");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".cloudify")).unwrap_or(system_dir)
}

/// Get the configuration directory.
pub fn config_dir() -> PathBuf {
    data_dir()
}

/// Get the database path.
pub fn db_path() -> PathBuf {
    data_dir().join("cloudify.db")
}

/// Get the base directory for per-environment compose files.
pub fn environments_dir() -> PathBuf {
    data_dir().join("environments")
}

/// Get the working directory for a specific environment.
pub fn environment_dir(environment_id: Uuid) -> PathBuf {
    environments_dir().join(environment_id.to_string())
}
