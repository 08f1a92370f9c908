//! Environment overview use case.

use crate::compose::ManifestRenderer;
use crate::error::{CloudifyError, Result};
use crate::handlers::{connection_info, ResourceSummary};
use crate::state::StateStore;
use crate::sysinfo::{HostProfile, SystemProfileProvider};
use crate::types::Environment;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Full snapshot of an environment for display.
#[derive(Debug, Clone)]
pub struct EnvironmentOverview {
    pub environment: Environment,
    pub resources: Vec<ResourceSummary>,
    pub compose_yaml: String,
    pub host_profile: HostProfile,
}

/// Builds environment overviews.
pub struct EnvironmentOverviewHandler {
    store: Arc<dyn StateStore>,
    renderer: ManifestRenderer,
    profiles: Arc<dyn SystemProfileProvider>,
}

impl EnvironmentOverviewHandler {
    pub fn new(store: Arc<dyn StateStore>, profiles: Arc<dyn SystemProfileProvider>) -> Self {
        Self { renderer: ManifestRenderer::new(store.clone()), store, profiles }
    }

    #[instrument(skip(self), fields(environment_id = %environment_id))]
    pub async fn handle(&self, environment_id: Uuid) -> Result<EnvironmentOverview> {
        let environment = self
            .store
            .get_environment(environment_id)
            .await?
            .ok_or(CloudifyError::EnvironmentNotFound { environment_id })?;

        let resources = self.store.list_resources(environment_id).await?;
        let compose_yaml = self.renderer.render(environment_id).await?;
        let host_profile = self.profiles.host_profile().await?;

        let mut summaries = Vec::with_capacity(resources.len());
        for resource in &resources {
            let ports = self.store.list_resource_ports(environment_id, resource.id).await?;
            // Lowest allocated port is the advertised connection endpoint.
            let connection = ports.first().map(|port| connection_info(resource, *port));
            summaries.push(ResourceSummary::from_resource(resource, connection));
        }

        Ok(EnvironmentOverview {
            environment,
            resources: summaries,
            compose_yaml,
            host_profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use crate::types::{
        CredentialProfile, EnvironmentName, NetworkMode, Resource, ResourceSpec, ResourceState,
        StorageProfile,
    };
    use chrono::Utc;

    #[tokio::test]
    async fn test_overview_includes_connection_and_manifest() {
        let store = Arc::new(MemoryStateStore::new());
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

        let resource = Resource::new(
            Uuid::new_v4(),
            environment.id,
            "orders-db",
            ResourceState::Running,
            Utc::now(),
            None,
            None,
            ResourceSpec::Postgres {
                storage: StorageProfile::new("pg-data", 20, "/var/lib/postgresql/data", true)
                    .unwrap(),
                credentials: CredentialProfile::new("admin", "secret").unwrap(),
            },
        )
        .unwrap();
        store.add_resource(&resource).await.unwrap();
        store.assign_port(environment.id, resource.id, 5433).await.unwrap();
        store.assign_port(environment.id, resource.id, 5432).await.unwrap();

        let handler = EnvironmentOverviewHandler::new(
            store,
            Arc::new(crate::sysinfo::HostSystemProfile::new()),
        );
        let overview = handler.handle(environment.id).await.unwrap();

        assert_eq!(overview.environment.id, environment.id);
        assert_eq!(overview.resources.len(), 1);

        let connection = overview.resources[0].connection.as_ref().unwrap();
        assert_eq!(connection.port, 5432, "lowest allocated port wins");
        assert_eq!(connection.username.as_deref(), Some("admin"));

        assert!(overview.compose_yaml.contains("postgres:16.4"));
        assert!(overview.host_profile.cpu_count >= 1);
    }

    #[tokio::test]
    async fn test_overview_unknown_environment() {
        let handler = EnvironmentOverviewHandler::new(
            Arc::new(MemoryStateStore::new()),
            Arc::new(crate::sysinfo::HostSystemProfile::new()),
        );

        let err = handler.handle(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CloudifyError::EnvironmentNotFound { .. }));
    }
}
