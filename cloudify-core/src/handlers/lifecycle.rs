//! Resource lifecycle use cases: start, stop, restart, scale, delete.

use crate::error::{CloudifyError, Result};
use crate::orchestrator::Orchestrator;
use crate::state::StateStore;
use crate::types::{CapacityProfile, Resource, ResourceState};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Drives resource state transitions through the orchestrator.
pub struct ResourceLifecycleHandler {
    store: Arc<dyn StateStore>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl ResourceLifecycleHandler {
    pub fn new(store: Arc<dyn StateStore>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { store, orchestrator }
    }

    async fn get_resource(&self, resource_id: Uuid) -> Result<Resource> {
        self.store
            .get_resource(resource_id)
            .await?
            .ok_or(CloudifyError::ResourceNotFound { resource_id })
    }

    /// Start a resource and persist the Running state.
    #[instrument(skip(self), fields(resource_id = %resource_id))]
    pub async fn start(&self, resource_id: Uuid) -> Result<Resource> {
        let mut resource = self.get_resource(resource_id).await?;

        self.orchestrator.start_resource(resource.id).await?;
        resource.set_state(ResourceState::Running);
        self.store.update_resource(&resource).await?;

        Ok(resource)
    }

    /// Stop a resource and persist the Stopped state.
    #[instrument(skip(self), fields(resource_id = %resource_id))]
    pub async fn stop(&self, resource_id: Uuid) -> Result<Resource> {
        let mut resource = self.get_resource(resource_id).await?;

        self.orchestrator.stop_resource(resource.id).await?;
        resource.set_state(ResourceState::Stopped);
        self.store.update_resource(&resource).await?;

        Ok(resource)
    }

    /// Restart a resource and persist the Running state.
    #[instrument(skip(self), fields(resource_id = %resource_id))]
    pub async fn restart(&self, resource_id: Uuid) -> Result<Resource> {
        let mut resource = self.get_resource(resource_id).await?;

        self.orchestrator.restart_resource(resource.id).await?;
        resource.set_state(ResourceState::Running);
        self.store.update_resource(&resource).await?;

        Ok(resource)
    }

    /// Scale a resource, replacing its capacity profile wholesale.
    #[instrument(skip(self), fields(resource_id = %resource_id, replicas = replicas))]
    pub async fn scale(&self, resource_id: Uuid, replicas: u32) -> Result<Resource> {
        if replicas < 1 {
            return Err(CloudifyError::validation("Replicas must be at least 1."));
        }

        let mut resource = self.get_resource(resource_id).await?;

        let capacity = match &resource.capacity {
            Some(existing) => existing.with_replicas(replicas)?,
            None => CapacityProfile::new(None, None, replicas, None)?,
        };

        self.orchestrator.scale_resource(resource.id, replicas).await?;
        resource.set_capacity(Some(capacity));
        self.store.update_resource(&resource).await?;

        Ok(resource)
    }

    /// Delete a resource together with all its port allocations.
    #[instrument(skip(self), fields(resource_id = %resource_id))]
    pub async fn delete(&self, resource_id: Uuid) -> Result<()> {
        let resource = self.get_resource(resource_id).await?;

        self.store.remove_ports(resource.environment_id, resource.id).await?;
        self.store.remove_resource(resource.id).await?;

        Ok(())
    }
}
