//! Health reporting types.

use crate::types::resource::ResourceState;
use serde::{Deserialize, Serialize};

/// Unified health status for resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    /// String representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        }
    }
}

/// Point-in-time health snapshot for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHealth {
    /// Runtime state as reported by the orchestrator.
    pub state: ResourceState,
    /// Computed health status.
    pub status: HealthStatus,
}

impl ResourceHealth {
    pub fn new(state: ResourceState, status: HealthStatus) -> Self {
        Self { state, status }
    }
}
