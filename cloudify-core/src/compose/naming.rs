//! Deterministic naming for compose artifacts.

use crate::types::{Resource, ResourceKind};
use uuid::Uuid;

/// Compose service name for a resource: `{type-prefix}-{short id}`.
pub fn service_name(resource: &Resource) -> String {
    format!("{}-{}", service_prefix(resource.kind()), short_id(resource.id))
}

/// Named volume for a resource in the given environment.
pub fn volume_name(environment_id: Uuid, resource_id: Uuid) -> String {
    format!("cloudify-{}-{}-data", environment_id, short_id(resource_id))
}

/// Compose project name for an environment.
pub fn project_name(environment_id: Uuid) -> String {
    format!("cloudify-{}", environment_id)
}

/// First six hex characters of the identifier.
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..6].to_string()
}

/// Compose service prefix for a resource type.
pub fn service_prefix(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Redis => "redis",
        ResourceKind::Postgres => "postgres",
        ResourceKind::Mongo => "mongo",
        ResourceKind::Rabbit => "rabbitmq",
        ResourceKind::AppService => "appservice",
    }
}
