//! Resource domain types.

use crate::error::{CloudifyError, Result};
use crate::types::profiles::{CapacityProfile, CredentialProfile, PortPolicy, StorageProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Redis,
    Postgres,
    Mongo,
    Rabbit,
    AppService,
}

impl ResourceKind {
    /// Parse a kind from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "postgres" => Some(Self::Postgres),
            "mongo" => Some(Self::Mongo),
            "rabbit" => Some(Self::Rabbit),
            "appservice" => Some(Self::AppService),
            _ => None,
        }
    }

    /// String representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Postgres => "postgres",
            Self::Mongo => "mongo",
            Self::Rabbit => "rabbit",
            Self::AppService => "appservice",
        }
    }

    /// Whether the type requires a storage profile.
    pub fn requires_storage(&self) -> bool {
        matches!(self, Self::Redis | Self::Postgres | Self::Mongo | Self::Rabbit)
    }

    /// Whether the type requires a credential profile.
    pub fn requires_credentials(&self) -> bool {
        matches!(self, Self::Postgres | Self::Mongo | Self::Rabbit)
    }
}

/// Lifecycle state for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Provisioning,
    Running,
    Stopped,
    Failed,
    Deleted,
}

impl ResourceState {
    /// Parse a state from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "provisioning" => Some(Self::Provisioning),
            "running" => Some(Self::Running),
            "stopped" => Some(Self::Stopped),
            "failed" => Some(Self::Failed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// String representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }
}

/// Type-specific payload for a resource.
///
/// The discriminant is explicit so handlers and the renderer can match
/// exhaustively; the compiler flags any new variant that is not handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceSpec {
    Redis { storage: StorageProfile },
    Postgres { storage: StorageProfile, credentials: CredentialProfile },
    Mongo { storage: StorageProfile, credentials: CredentialProfile },
    Rabbit { storage: StorageProfile, credentials: CredentialProfile },
    AppService { image: String, health_endpoint: Option<String> },
}

impl ResourceSpec {
    /// The discriminant for this payload.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Redis { .. } => ResourceKind::Redis,
            Self::Postgres { .. } => ResourceKind::Postgres,
            Self::Mongo { .. } => ResourceKind::Mongo,
            Self::Rabbit { .. } => ResourceKind::Rabbit,
            Self::AppService { .. } => ResourceKind::AppService,
        }
    }
}

/// A single service instance within an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier.
    pub id: Uuid,
    /// Owning environment.
    pub environment_id: Uuid,
    /// Resource name, unique within the environment (case-insensitive).
    pub name: String,
    /// Lifecycle state.
    pub state: ResourceState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional capacity requirements.
    pub capacity: Option<CapacityProfile>,
    /// Optional declared port exposure.
    pub port_policy: Option<PortPolicy>,
    /// Type-specific payload.
    pub spec: ResourceSpec,
}

impl Resource {
    /// Create a resource with validated shared fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        environment_id: Uuid,
        name: impl Into<String>,
        state: ResourceState,
        created_at: DateTime<Utc>,
        capacity: Option<CapacityProfile>,
        port_policy: Option<PortPolicy>,
        spec: ResourceSpec,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CloudifyError::validation("Resource name is required."));
        }

        if let ResourceSpec::AppService { image, .. } = &spec {
            if image.trim().is_empty() {
                return Err(CloudifyError::validation("Application service image is required."));
            }
        }

        Ok(Self { id, environment_id, name, state, created_at, capacity, port_policy, spec })
    }

    /// The resource type discriminant.
    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    /// Update the lifecycle state.
    pub fn set_state(&mut self, state: ResourceState) {
        self.state = state;
    }

    /// Storage profile, when the type carries one.
    pub fn storage(&self) -> Option<&StorageProfile> {
        match &self.spec {
            ResourceSpec::Redis { storage }
            | ResourceSpec::Postgres { storage, .. }
            | ResourceSpec::Mongo { storage, .. }
            | ResourceSpec::Rabbit { storage, .. } => Some(storage),
            ResourceSpec::AppService { .. } => None,
        }
    }

    /// Credential profile, when the type carries one.
    pub fn credentials(&self) -> Option<&CredentialProfile> {
        match &self.spec {
            ResourceSpec::Postgres { credentials, .. }
            | ResourceSpec::Mongo { credentials, .. }
            | ResourceSpec::Rabbit { credentials, .. } => Some(credentials),
            ResourceSpec::Redis { .. } | ResourceSpec::AppService { .. } => None,
        }
    }

    /// Container image for application services.
    pub fn app_image(&self) -> Option<&str> {
        match &self.spec {
            ResourceSpec::AppService { image, .. } => Some(image),
            _ => None,
        }
    }

    /// Effective replica count from the capacity profile.
    pub fn replicas(&self) -> u32 {
        self.capacity.as_ref().map(|c| c.replicas).unwrap_or(1)
    }

    /// Replace the port policy wholesale.
    pub fn set_port_policy(&mut self, policy: Option<PortPolicy>) {
        self.port_policy = policy;
    }

    /// Replace the capacity profile wholesale.
    pub fn set_capacity(&mut self, capacity: Option<CapacityProfile>) {
        self.capacity = capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> StorageProfile {
        StorageProfile::new("data", 1, "/data", true).unwrap()
    }

    #[test]
    fn test_kind_matches_spec() {
        let resource = Resource::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "cache",
            ResourceState::Provisioning,
            Utc::now(),
            None,
            None,
            ResourceSpec::Redis { storage: storage() },
        )
        .unwrap();
        assert_eq!(resource.kind(), ResourceKind::Redis);
        assert!(resource.storage().is_some());
        assert!(resource.credentials().is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Resource::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "",
            ResourceState::Provisioning,
            Utc::now(),
            None,
            None,
            ResourceSpec::Redis { storage: storage() },
        )
        .unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
    }

    #[test]
    fn test_app_service_requires_image() {
        let err = Resource::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "web",
            ResourceState::Provisioning,
            Utc::now(),
            None,
            None,
            ResourceSpec::AppService { image: " ".into(), health_endpoint: None },
        )
        .unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
    }

    #[test]
    fn test_requires_flags() {
        assert!(ResourceKind::Redis.requires_storage());
        assert!(!ResourceKind::Redis.requires_credentials());
        assert!(ResourceKind::Postgres.requires_credentials());
        assert!(!ResourceKind::AppService.requires_storage());
    }
}
