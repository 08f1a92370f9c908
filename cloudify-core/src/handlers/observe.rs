//! Resource observation use cases: logs and health.

use crate::error::{CloudifyError, Result};
use crate::orchestrator::Orchestrator;
use crate::state::StateStore;
use crate::types::{HealthStatus, ResourceHealth, ResourceState};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Handles resource log retrieval.
pub struct ResourceLogsHandler {
    store: Arc<dyn StateStore>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl ResourceLogsHandler {
    pub fn new(store: Arc<dyn StateStore>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { store, orchestrator }
    }

    #[instrument(skip(self), fields(resource_id = %resource_id, tail = tail))]
    pub async fn handle(
        &self,
        resource_id: Uuid,
        tail: u32,
        service_name: Option<&str>,
    ) -> Result<String> {
        if tail < 1 {
            return Err(CloudifyError::validation("Tail must be at least 1."));
        }

        if self.store.get_resource(resource_id).await?.is_none() {
            return Err(CloudifyError::ResourceNotFound { resource_id });
        }

        let service_name = service_name.map(str::trim).filter(|s| !s.is_empty());
        self.orchestrator.resource_logs(resource_id, tail, service_name).await
    }
}

/// Handles best-effort resource health checks.
pub struct ResourceHealthHandler {
    store: Arc<dyn StateStore>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl ResourceHealthHandler {
    pub fn new(store: Arc<dyn StateStore>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { store, orchestrator }
    }

    /// Fetch health for a resource. Orchestrator failures downgrade to an
    /// unknown result instead of propagating; validation and not-found
    /// errors still surface.
    #[instrument(skip(self), fields(resource_id = %resource_id))]
    pub async fn handle(&self, resource_id: Uuid) -> Result<ResourceHealth> {
        if self.store.get_resource(resource_id).await?.is_none() {
            return Err(CloudifyError::ResourceNotFound { resource_id });
        }

        match self.orchestrator.resource_health(resource_id).await {
            Ok(health) => Ok(health),
            Err(e) => {
                warn!(resource_id = %resource_id, error = %e, "Health check failed, reporting unknown");
                Ok(ResourceHealth::new(ResourceState::Failed, HealthStatus::Unknown))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::StubOrchestrator;
    use crate::state::MemoryStateStore;
    use crate::types::{Resource, ResourceSpec, StorageProfile};
    use chrono::Utc;

    async fn seeded(store: &dyn StateStore) -> Resource {
        let resource = Resource::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "cache",
            ResourceState::Running,
            Utc::now(),
            None,
            None,
            ResourceSpec::Redis {
                storage: StorageProfile::new("cache-data", 1, "/data", true).unwrap(),
            },
        )
        .unwrap();
        store.add_resource(&resource).await.unwrap();
        resource
    }

    #[tokio::test]
    async fn test_logs_require_positive_tail() {
        let store = Arc::new(MemoryStateStore::new());
        let resource = seeded(store.as_ref()).await;
        let handler = ResourceLogsHandler::new(store, Arc::new(StubOrchestrator::default()));

        let err = handler.handle(resource.id, 0, None).await.unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_logs_pass_through_orchestrator_output() {
        let store = Arc::new(MemoryStateStore::new());
        let resource = seeded(store.as_ref()).await;
        let handler = ResourceLogsHandler::new(store, Arc::new(StubOrchestrator::default()));

        let logs = handler.handle(resource.id, 50, None).await.unwrap();
        assert_eq!(logs, "log output");
    }

    #[tokio::test]
    async fn test_health_downgrades_orchestrator_failures() {
        let store = Arc::new(MemoryStateStore::new());
        let resource = seeded(store.as_ref()).await;
        let orchestrator = Arc::new(StubOrchestrator::default());
        let handler = ResourceHealthHandler::new(store, orchestrator.clone());

        orchestrator.fail_next();
        let health = handler.handle(resource.id).await.unwrap();

        assert_eq!(health.state, ResourceState::Failed);
        assert_eq!(health.status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_health_not_found_still_surfaces() {
        let store = Arc::new(MemoryStateStore::new());
        let handler = ResourceHealthHandler::new(store, Arc::new(StubOrchestrator::default()));

        let err = handler.handle(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CloudifyError::ResourceNotFound { .. }));
    }
}
