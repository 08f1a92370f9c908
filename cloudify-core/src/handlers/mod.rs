//! Lifecycle use cases.
//!
//! Each handler validates its request before touching any state, calls the
//! state store and orchestrator, and owns the rollback shape for its own
//! partial-failure paths. Validation and not-found errors never require
//! rollback because they are detected before mutation.

pub mod add_resource;
pub mod environments;
pub mod groups;
pub mod lifecycle;
pub mod observe;
pub mod overview;

#[cfg(test)]
pub(crate) mod test_support;

pub use add_resource::{AddResourceHandler, AddResourceRequest, AddResourceResponse};
pub use environments::{
    CreateEnvironmentHandler, CreateEnvironmentRequest, ListEnvironmentsHandler,
};
pub use groups::{CreateResourceGroupHandler, CreateResourceGroupRequest, ListResourceGroupsHandler};
pub use lifecycle::ResourceLifecycleHandler;
pub use observe::{ResourceHealthHandler, ResourceLogsHandler};
pub use overview::{EnvironmentOverview, EnvironmentOverviewHandler};

use crate::types::{
    CapacityProfile, PortPolicy, Resource, ResourceKind, ResourceState, StorageProfile,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Best-effort connection details for a created resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Flattened resource view returned by handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub name: String,
    pub kind: ResourceKind,
    pub state: ResourceState,
    pub created_at: DateTime<Utc>,
    pub capacity: Option<CapacityProfile>,
    pub storage: Option<StorageProfile>,
    pub exposed_ports: Option<Vec<u16>>,
    pub connection: Option<ConnectionInfo>,
}

impl ResourceSummary {
    /// Build a summary from a resource and optional connection info.
    pub fn from_resource(resource: &Resource, connection: Option<ConnectionInfo>) -> Self {
        Self {
            id: resource.id,
            environment_id: resource.environment_id,
            name: resource.name.clone(),
            kind: resource.kind(),
            state: resource.state,
            created_at: resource.created_at,
            capacity: resource.capacity.clone(),
            storage: resource.storage().cloned(),
            exposed_ports: resource
                .port_policy
                .as_ref()
                .map(PortPolicy::exposed_ports)
                .map(<[u16]>::to_vec),
            connection,
        }
    }
}

/// Connection info for a resource given its allocated host port.
pub(crate) fn connection_info(resource: &Resource, port: u16) -> ConnectionInfo {
    let credentials = resource.credentials();
    ConnectionInfo {
        host: "localhost".to_string(),
        port,
        username: credentials.map(|c| c.username.clone()),
        password: credentials.map(|c| c.password.clone()),
    }
}
