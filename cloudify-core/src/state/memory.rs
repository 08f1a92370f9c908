//! In-memory state store.
//!
//! Reference implementation of the [`StateStore`] contract, used by handler
//! tests and as the executable specification of the port-assignment
//! semantics. `assign_port` holds the same fail-closed behavior as the
//! SQLite unique constraint.

use crate::error::Result;
use crate::state::StateStore;
use crate::types::{Environment, Resource, ResourceGroup};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    groups: Vec<ResourceGroup>,
    environments: Vec<Environment>,
    resources: Vec<Resource>,
    // (environment_id, resource_id) -> ports
    ports: HashMap<(Uuid, Uuid), Vec<u16>>,
}

impl Inner {
    fn ports_in_environment(&self, environment_id: Uuid) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .ports
            .iter()
            .filter(|((env, _), _)| *env == environment_id)
            .flat_map(|(_, ports)| ports.iter().copied())
            .collect();
        ports.sort_unstable();
        ports
    }
}

/// Mutex-guarded in-memory implementation of [`StateStore`].
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn add_resource_group(&self, group: &ResourceGroup) -> Result<()> {
        self.inner.lock().unwrap().groups.push(group.clone());
        Ok(())
    }

    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>> {
        let mut groups = self.inner.lock().unwrap().groups.clone();
        groups.sort_by_key(|g| g.created_at);
        Ok(groups)
    }

    async fn get_resource_group(&self, group_id: Uuid) -> Result<Option<ResourceGroup>> {
        Ok(self.inner.lock().unwrap().groups.iter().find(|g| g.id == group_id).cloned())
    }

    async fn add_environment(&self, environment: &Environment) -> Result<()> {
        self.inner.lock().unwrap().environments.push(environment.clone());
        Ok(())
    }

    async fn get_environment(&self, environment_id: Uuid) -> Result<Option<Environment>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .environments
            .iter()
            .find(|e| e.id == environment_id)
            .cloned())
    }

    async fn list_environments(&self, group_id: Uuid) -> Result<Vec<Environment>> {
        let mut environments: Vec<Environment> = self
            .inner
            .lock()
            .unwrap()
            .environments
            .iter()
            .filter(|e| e.resource_group_id == group_id)
            .cloned()
            .collect();
        environments.sort_by_key(|e| e.created_at);
        Ok(environments)
    }

    async fn add_resource(&self, resource: &Resource) -> Result<()> {
        self.inner.lock().unwrap().resources.push(resource.clone());
        Ok(())
    }

    async fn get_resource(&self, resource_id: Uuid) -> Result<Option<Resource>> {
        Ok(self.inner.lock().unwrap().resources.iter().find(|r| r.id == resource_id).cloned())
    }

    async fn list_resources(&self, environment_id: Uuid) -> Result<Vec<Resource>> {
        let mut resources: Vec<Resource> = self
            .inner
            .lock()
            .unwrap()
            .resources
            .iter()
            .filter(|r| r.environment_id == environment_id)
            .cloned()
            .collect();
        resources.sort_by_key(|r| r.created_at);
        Ok(resources)
    }

    async fn update_resource(&self, resource: &Resource) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.resources.iter_mut().find(|r| r.id == resource.id) {
            *existing = resource.clone();
        }
        Ok(())
    }

    async fn remove_resource(&self, resource_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.resources.retain(|r| r.id != resource_id);
        inner.ports.retain(|(_, res), _| *res != resource_id);
        Ok(())
    }

    async fn assign_port(
        &self,
        environment_id: Uuid,
        resource_id: Uuid,
        port: u16,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.ports_in_environment(environment_id).contains(&port) {
            return Ok(false);
        }
        inner.ports.entry((environment_id, resource_id)).or_default().push(port);
        Ok(true)
    }

    async fn list_allocated_ports(&self, environment_id: Uuid) -> Result<Vec<u16>> {
        Ok(self.inner.lock().unwrap().ports_in_environment(environment_id))
    }

    async fn list_resource_ports(
        &self,
        environment_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<u16>> {
        let inner = self.inner.lock().unwrap();
        let mut ports = inner
            .ports
            .get(&(environment_id, resource_id))
            .cloned()
            .unwrap_or_default();
        ports.sort_unstable();
        Ok(ports)
    }

    async fn remove_ports(&self, environment_id: Uuid, resource_id: Uuid) -> Result<()> {
        self.inner.lock().unwrap().ports.remove(&(environment_id, resource_id));
        Ok(())
    }
}
