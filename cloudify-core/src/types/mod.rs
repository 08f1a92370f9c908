//! Domain types for Cloudify.

pub mod environment;
pub mod group;
pub mod health;
pub mod profiles;
pub mod resource;

pub use environment::{Environment, EnvironmentName, NetworkMode};
pub use group::ResourceGroup;
pub use health::{HealthStatus, ResourceHealth};
pub use profiles::{CapacityProfile, CredentialProfile, PortPolicy, StorageProfile};
pub use resource::{Resource, ResourceKind, ResourceSpec, ResourceState};
