//! Environment use cases.

use crate::error::{CloudifyError, Result};
use crate::orchestrator::Orchestrator;
use crate::state::StateStore;
use crate::types::{Environment, EnvironmentName, NetworkMode};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Request to create an environment under a resource group.
#[derive(Debug, Clone)]
pub struct CreateEnvironmentRequest {
    pub resource_group_id: Uuid,
    pub name: EnvironmentName,
    pub network_mode: NetworkMode,
    pub base_domain: Option<String>,
}

/// Handles environment creation.
pub struct CreateEnvironmentHandler {
    store: Arc<dyn StateStore>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl CreateEnvironmentHandler {
    pub fn new(store: Arc<dyn StateStore>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { store, orchestrator }
    }

    #[instrument(skip(self, request), fields(group_id = %request.resource_group_id))]
    pub async fn handle(&self, request: CreateEnvironmentRequest) -> Result<Environment> {
        if self.store.get_resource_group(request.resource_group_id).await?.is_none() {
            return Err(CloudifyError::ResourceGroupNotFound {
                group_id: request.resource_group_id,
            });
        }

        let environment = Environment::new(
            Uuid::new_v4(),
            request.resource_group_id,
            request.name,
            request.network_mode,
            request.base_domain,
            Utc::now(),
        )?;

        self.store.add_environment(&environment).await?;
        self.orchestrator.deploy_environment(environment.id).await?;

        Ok(environment)
    }
}

/// Handles listing environments for a resource group.
pub struct ListEnvironmentsHandler {
    store: Arc<dyn StateStore>,
}

impl ListEnvironmentsHandler {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, resource_group_id: Uuid) -> Result<Vec<Environment>> {
        self.store.list_environments(resource_group_id).await
    }
}
