//! Error types for Cloudify.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for Cloudify operations.
pub type Result<T> = std::result::Result<T, CloudifyError>;

/// Main error type for Cloudify.
#[derive(Error, Debug)]
pub enum CloudifyError {
    // Input errors
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    // Lookup errors
    #[error("Resource group not found: {group_id}")]
    ResourceGroupNotFound { group_id: Uuid },

    #[error("Environment not found: {environment_id}")]
    EnvironmentNotFound { environment_id: Uuid },

    #[error("Resource not found: {resource_id}")]
    ResourceNotFound { resource_id: Uuid },

    // Port allocation errors
    #[error("Port {port} is already allocated or bound on the host")]
    PortConflict { port: u16 },

    #[error("No available ports could be allocated: {reason}")]
    PortExhausted { reason: String },

    // Process errors
    #[error("Process '{command}' failed with exit code {exit_code:?}: {stderr}")]
    ProcessFailed { command: String, exit_code: Option<i32>, stderr: String },

    #[error("Process '{command}' could not be started")]
    ProcessStartFailed { command: String },

    #[error("Process '{command}' exceeded the configured timeout")]
    ProcessTimeout { command: String },

    #[error("Process '{command}' was cancelled")]
    ProcessCancelled { command: String },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CloudifyError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Create a Validation error from a message.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }
}
