//! Resource creation with the port retry/rollback protocol.
//!
//! Port allocation proposes a port from a fresh read of the store, but only
//! the store's atomic `assign_port` commits it. Between propose and commit a
//! concurrent creation may take the same port, so the commit is wrapped in a
//! bounded retry loop:
//!
//! - a rejected *requested* port never retries: the just-created resource is
//!   deleted and a conflict error surfaces;
//! - a rejected *automatic* port is re-proposed from a fresh read, the
//!   persisted policy is updated, and the commit is retried, up to
//!   [`MAX_ALLOCATION_ATTEMPTS`] before the resource is deleted and an
//!   allocation-exhausted error surfaces.
//!
//! The resource row is persisted before the first commit attempt so that the
//! compensating delete is always well-defined.

use crate::error::{CloudifyError, Result};
use crate::handlers::{connection_info, ConnectionInfo, ResourceSummary};
use crate::orchestrator::Orchestrator;
use crate::ports::{PortAllocation, PortAllocator};
use crate::state::StateStore;
use crate::types::{
    CapacityProfile, CredentialProfile, PortPolicy, Resource, ResourceKind, ResourceSpec,
    ResourceState, StorageProfile,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Cap on assignment attempts for automatically chosen ports.
const MAX_ALLOCATION_ATTEMPTS: u32 = 20;

/// Capacity profile fields as supplied by the caller.
#[derive(Debug, Clone)]
pub struct CapacitySpec {
    pub cpu_limit: Option<u32>,
    pub memory_limit_gb: Option<u32>,
    pub replicas: u32,
    pub notes: Option<String>,
}

/// Storage profile fields as supplied by the caller.
#[derive(Debug, Clone)]
pub struct StorageSpec {
    pub volume_name: String,
    pub size_gb: u32,
    pub mount_path: String,
    pub persistent: bool,
}

/// Credential fields as supplied by the caller.
#[derive(Debug, Clone)]
pub struct CredentialSpec {
    pub username: String,
    pub password: String,
}

/// Request to add a resource to an environment.
#[derive(Debug, Clone)]
pub struct AddResourceRequest {
    pub environment_id: Uuid,
    pub name: String,
    pub kind: ResourceKind,
    /// Explicitly requested host port; requested ports never retry.
    pub requested_port: Option<u16>,
    /// Declared container ports, independent of allocation.
    pub exposed_ports: Vec<u16>,
    pub capacity: Option<CapacitySpec>,
    pub storage: Option<StorageSpec>,
    pub credentials: Option<CredentialSpec>,
    /// Container image, required for application services.
    pub image: Option<String>,
    /// Optional HTTP health-check path for application services.
    pub health_endpoint: Option<String>,
}

/// Outcome of a resource creation.
#[derive(Debug, Clone)]
pub struct AddResourceResponse {
    pub resource: ResourceSummary,
}

/// Handles resource creation requests.
pub struct AddResourceHandler {
    store: Arc<dyn StateStore>,
    allocator: PortAllocator,
    orchestrator: Arc<dyn Orchestrator>,
}

impl AddResourceHandler {
    pub fn new(
        store: Arc<dyn StateStore>,
        allocator: PortAllocator,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Self {
        Self { store, allocator, orchestrator }
    }

    #[instrument(skip(self, request), fields(environment_id = %request.environment_id, name = %request.name))]
    pub async fn handle(&self, request: AddResourceRequest) -> Result<AddResourceResponse> {
        let (capacity, spec) = validate(&request)?;

        if self.store.get_environment(request.environment_id).await?.is_none() {
            return Err(CloudifyError::EnvironmentNotFound {
                environment_id: request.environment_id,
            });
        }

        let siblings = self.store.list_resources(request.environment_id).await?;
        if siblings.iter().any(|r| r.name.eq_ignore_ascii_case(request.name.trim())) {
            return Err(CloudifyError::validation(
                "Resource name must be unique within the environment.",
            ));
        }

        // Propose only when the caller asked for network exposure.
        let mut allocation: Option<PortAllocation> = None;
        if request.requested_port.is_some() || !request.exposed_ports.is_empty() {
            allocation = Some(
                self.allocator
                    .allocate(request.environment_id, request.kind, request.requested_port)
                    .await?,
            );
        }

        let mut resource = Resource::new(
            Uuid::new_v4(),
            request.environment_id,
            request.name.trim(),
            ResourceState::Provisioning,
            Utc::now(),
            capacity,
            merged_policy(&request.exposed_ports, allocation.map(|a| a.port))?,
            spec,
        )?;

        // Persist first so the compensating delete is well-defined.
        self.store.add_resource(&resource).await?;

        let committed_port = match allocation {
            Some(allocation) => Some(self.commit_port(&mut resource, &request, allocation).await?),
            None => None,
        };

        self.orchestrator.deploy_environment(request.environment_id).await?;

        let connection = committed_port.map(|port| connection_info(&resource, port));
        Ok(AddResourceResponse { resource: ResourceSummary::from_resource(&resource, connection) })
    }

    /// Commit a proposed port, retrying automatic proposals on lost races.
    async fn commit_port(
        &self,
        resource: &mut Resource,
        request: &AddResourceRequest,
        mut allocation: PortAllocation,
    ) -> Result<u16> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            if self
                .store
                .assign_port(request.environment_id, resource.id, allocation.port)
                .await?
            {
                return Ok(allocation.port);
            }

            if allocation.was_requested {
                self.rollback(resource).await;
                return Err(CloudifyError::PortConflict { port: allocation.port });
            }

            if attempts >= MAX_ALLOCATION_ATTEMPTS {
                self.rollback(resource).await;
                return Err(CloudifyError::PortExhausted {
                    reason: format!(
                        "no port assignment succeeded after {} attempts",
                        MAX_ALLOCATION_ATTEMPTS
                    ),
                });
            }

            // Lost the race on an automatic port: re-derive from a fresh read
            // and move the persisted policy to the new candidate.
            allocation = match self
                .allocator
                .allocate(request.environment_id, request.kind, None)
                .await
            {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.rollback(resource).await;
                    return Err(e);
                }
            };

            resource.set_port_policy(merged_policy(
                &request.exposed_ports,
                Some(allocation.port),
            )?);
            if let Err(e) = self.store.update_resource(resource).await {
                self.rollback(resource).await;
                return Err(e);
            }
        }
    }

    /// Compensating delete: partial state is never left visible.
    async fn rollback(&self, resource: &Resource) {
        if let Err(e) = self.store.remove_ports(resource.environment_id, resource.id).await {
            warn!(resource_id = %resource.id, error = %e, "Failed to remove ports during rollback");
        }
        if let Err(e) = self.store.remove_resource(resource.id).await {
            warn!(resource_id = %resource.id, error = %e, "Failed to remove resource during rollback");
        }
    }
}

/// Validate the request and build the typed profile set.
fn validate(request: &AddResourceRequest) -> Result<(Option<CapacityProfile>, ResourceSpec)> {
    if request.name.trim().is_empty() {
        return Err(CloudifyError::validation("Resource name is required."));
    }

    if request.requested_port == Some(0) {
        return Err(CloudifyError::validation("Requested port must be between 1 and 65535."));
    }

    if request.exposed_ports.contains(&0) {
        return Err(CloudifyError::validation("Exposed ports must be between 1 and 65535."));
    }

    let capacity = request
        .capacity
        .as_ref()
        .map(|c| CapacityProfile::new(c.cpu_limit, c.memory_limit_gb, c.replicas, c.notes.clone()))
        .transpose()?;

    let storage = if request.kind.requires_storage() {
        let spec = request.storage.as_ref().ok_or_else(|| {
            CloudifyError::validation("Storage profile is required for the selected resource type.")
        })?;
        Some(StorageProfile::new(
            spec.volume_name.clone(),
            spec.size_gb,
            spec.mount_path.clone(),
            spec.persistent,
        )?)
    } else {
        None
    };

    let credentials = if request.kind.requires_credentials() {
        let spec = request.credentials.as_ref().ok_or_else(|| {
            CloudifyError::validation(
                "Credential profile is required for the selected resource type.",
            )
        })?;
        Some(CredentialProfile::new(spec.username.clone(), spec.password.clone())?)
    } else {
        None
    };

    let spec = build_spec(request, storage, credentials)?;
    Ok((capacity, spec))
}

fn build_spec(
    request: &AddResourceRequest,
    storage: Option<StorageProfile>,
    credentials: Option<CredentialProfile>,
) -> Result<ResourceSpec> {
    let storage = |kind: &str| {
        storage.clone().ok_or_else(|| {
            CloudifyError::Internal(format!("missing validated storage profile for {}", kind))
        })
    };
    let credentials = |kind: &str| {
        credentials.clone().ok_or_else(|| {
            CloudifyError::Internal(format!("missing validated credential profile for {}", kind))
        })
    };

    match request.kind {
        ResourceKind::Redis => Ok(ResourceSpec::Redis { storage: storage("redis")? }),
        ResourceKind::Postgres => Ok(ResourceSpec::Postgres {
            storage: storage("postgres")?,
            credentials: credentials("postgres")?,
        }),
        ResourceKind::Mongo => Ok(ResourceSpec::Mongo {
            storage: storage("mongo")?,
            credentials: credentials("mongo")?,
        }),
        ResourceKind::Rabbit => Ok(ResourceSpec::Rabbit {
            storage: storage("rabbit")?,
            credentials: credentials("rabbit")?,
        }),
        ResourceKind::AppService => {
            let image = request.image.as_deref().unwrap_or_default().trim().to_string();
            if image.is_empty() {
                return Err(CloudifyError::validation("Application service image is required."));
            }
            let health_endpoint = request
                .health_endpoint
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            Ok(ResourceSpec::AppService { image, health_endpoint })
        }
    }
}

/// Declared ports plus the allocated port, as the persisted policy.
fn merged_policy(declared: &[u16], allocated: Option<u16>) -> Result<Option<PortPolicy>> {
    let mut ports = declared.to_vec();
    if let Some(port) = allocated {
        if !ports.contains(&port) {
            ports.push(port);
        }
    }

    if ports.is_empty() {
        return Ok(None);
    }

    Ok(Some(PortPolicy::new(ports)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{ContestedPortStore, StubOrchestrator};
    use crate::state::MemoryStateStore;
    use crate::types::{Environment, EnvironmentName, NetworkMode};

    fn postgres_request(environment_id: Uuid) -> AddResourceRequest {
        AddResourceRequest {
            environment_id,
            name: "orders-db".into(),
            kind: ResourceKind::Postgres,
            requested_port: None,
            exposed_ports: vec![5432],
            capacity: None,
            storage: Some(StorageSpec {
                volume_name: "pg-data".into(),
                size_gb: 20,
                mount_path: "/var/lib/postgresql/data".into(),
                persistent: true,
            }),
            credentials: Some(CredentialSpec { username: "admin".into(), password: "secret".into() }),
            image: None,
            health_endpoint: None,
        }
    }

    async fn environment(store: &dyn StateStore) -> Environment {
        let environment = Environment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            EnvironmentName::Dev,
            NetworkMode::Bridge,
            None,
            Utc::now(),
        )
        .unwrap();
        store.add_environment(&environment).await.unwrap();
        environment
    }

    fn handler(
        store: Arc<dyn StateStore>,
        orchestrator: Arc<StubOrchestrator>,
    ) -> AddResourceHandler {
        AddResourceHandler::new(store.clone(), PortAllocator::new(store), orchestrator)
    }

    #[tokio::test]
    async fn test_add_postgres_commits_port_and_deploys() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        let orchestrator = Arc::new(StubOrchestrator::default());
        let handler = handler(store.clone(), orchestrator.clone());

        let response = handler.handle(postgres_request(env.id)).await.unwrap();
        let resource = response.resource;

        assert_eq!(resource.state, ResourceState::Provisioning);
        assert_eq!(resource.kind, ResourceKind::Postgres);

        let connection = resource.connection.unwrap();
        assert_eq!(connection.host, "localhost");
        assert!(connection.port >= 5432);
        assert_eq!(connection.username.as_deref(), Some("admin"));
        assert_eq!(connection.password.as_deref(), Some("secret"));

        let allocated = store.list_allocated_ports(env.id).await.unwrap();
        assert_eq!(allocated, vec![connection.port]);
        assert_eq!(orchestrator.deploys(), vec![env.id]);
    }

    #[tokio::test]
    async fn test_missing_storage_is_validation_error() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        let orchestrator = Arc::new(StubOrchestrator::default());
        let handler = handler(store.clone(), orchestrator);

        let mut request = postgres_request(env.id);
        request.storage = None;
        let err = handler.handle(request).await.unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
        assert!(store.list_resources(env.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_is_validation_error() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        let handler = handler(store.clone(), Arc::new(StubOrchestrator::default()));

        let mut request = postgres_request(env.id);
        request.credentials = None;
        assert!(handler.handle(request).await.is_err());
    }

    #[tokio::test]
    async fn test_app_service_requires_image() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        let handler = handler(store.clone(), Arc::new(StubOrchestrator::default()));

        let request = AddResourceRequest {
            environment_id: env.id,
            name: "web".into(),
            kind: ResourceKind::AppService,
            requested_port: None,
            exposed_ports: vec![],
            capacity: None,
            storage: None,
            credentials: None,
            image: None,
            health_endpoint: None,
        };
        let err = handler.handle(request).await.unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_requested_port_zero_fails_before_any_mutation() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        let orchestrator = Arc::new(StubOrchestrator::default());
        let handler = handler(store.clone(), orchestrator.clone());

        let mut request = postgres_request(env.id);
        request.requested_port = Some(0);
        let err = handler.handle(request).await.unwrap_err();

        assert!(matches!(err, CloudifyError::Validation { .. }));
        assert!(store.list_resources(env.id).await.unwrap().is_empty());
        assert!(store.list_allocated_ports(env.id).await.unwrap().is_empty());
        assert!(orchestrator.deploys().is_empty());
    }

    #[tokio::test]
    async fn test_requested_port_conflict_leaves_no_orphan_row() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        store.assign_port(env.id, Uuid::new_v4(), 15_432).await.unwrap();
        let orchestrator = Arc::new(StubOrchestrator::default());
        let handler = handler(store.clone(), orchestrator.clone());

        let mut request = postgres_request(env.id);
        request.requested_port = Some(15_432);
        let err = handler.handle(request).await.unwrap_err();

        assert!(matches!(err, CloudifyError::PortConflict { port: 15_432 }));
        assert_eq!(store.list_resources(env.id).await.unwrap().len(), 0);
        assert!(orchestrator.deploys().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_environment_is_not_found() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let handler = handler(store, Arc::new(StubOrchestrator::default()));

        let err = handler.handle(postgres_request(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, CloudifyError::EnvironmentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected_case_insensitively() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        let handler = handler(store.clone(), Arc::new(StubOrchestrator::default()));

        handler.handle(postgres_request(env.id)).await.unwrap();

        let mut duplicate = postgres_request(env.id);
        duplicate.name = "Orders-DB".into();
        let err = handler.handle(duplicate).await.unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
        assert_eq!(store.list_resources(env.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resource_without_ports_skips_allocation() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(store.as_ref()).await;
        let orchestrator = Arc::new(StubOrchestrator::default());
        let handler = handler(store.clone(), orchestrator.clone());

        let request = AddResourceRequest {
            environment_id: env.id,
            name: "worker".into(),
            kind: ResourceKind::AppService,
            requested_port: None,
            exposed_ports: vec![],
            capacity: None,
            storage: None,
            credentials: None,
            image: Some("acme/worker:2".into()),
            health_endpoint: None,
        };
        let response = handler.handle(request).await.unwrap();

        assert!(response.resource.connection.is_none());
        assert!(store.list_allocated_ports(env.id).await.unwrap().is_empty());
        assert_eq!(orchestrator.deploys(), vec![env.id]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_delete_the_resource() {
        let inner: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let env = environment(inner.as_ref()).await;
        let store = Arc::new(ContestedPortStore::new(inner.clone()));
        let orchestrator = Arc::new(StubOrchestrator::default());
        let handler = AddResourceHandler::new(
            store.clone(),
            PortAllocator::new(store.clone()),
            orchestrator.clone(),
        );

        let err = handler.handle(postgres_request(env.id)).await.unwrap_err();

        assert!(matches!(err, CloudifyError::PortExhausted { .. }));
        assert_eq!(store.attempts.lock().unwrap().len(), 20);
        // Compensating delete removed the resource from the backing store.
        assert!(inner.list_resources(env.id).await.unwrap().is_empty());
        assert!(orchestrator.deploys().is_empty());
    }
}
