//! Resource group use cases.

use crate::error::Result;
use crate::state::StateStore;
use crate::types::ResourceGroup;
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Request to create a resource group.
#[derive(Debug, Clone, Default)]
pub struct CreateResourceGroupRequest {
    pub name: String,
    pub tags: Vec<(String, String)>,
}

/// Handles resource group creation.
pub struct CreateResourceGroupHandler {
    store: Arc<dyn StateStore>,
}

impl CreateResourceGroupHandler {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn handle(&self, request: CreateResourceGroupRequest) -> Result<ResourceGroup> {
        let group = ResourceGroup::new(Uuid::new_v4(), request.name, Utc::now(), request.tags)?;
        self.store.add_resource_group(&group).await?;
        Ok(group)
    }
}

/// Handles listing resource groups.
pub struct ListResourceGroupsHandler {
    store: Arc<dyn StateStore>,
}

impl ListResourceGroupsHandler {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self) -> Result<Vec<ResourceGroup>> {
        self.store.list_resource_groups().await
    }
}
