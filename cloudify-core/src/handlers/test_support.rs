//! Shared doubles for handler tests.

use crate::error::{CloudifyError, Result};
use crate::orchestrator::Orchestrator;
use crate::state::StateStore;
use crate::types::{Environment, HealthStatus, Resource, ResourceGroup, ResourceHealth, ResourceState};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Recording orchestrator that never touches an external CLI.
#[derive(Default)]
pub struct StubOrchestrator {
    deploys: Mutex<Vec<Uuid>>,
    operations: Mutex<Vec<(String, Uuid)>>,
    fail_next: AtomicBool,
}

impl StubOrchestrator {
    pub fn deploys(&self) -> Vec<Uuid> {
        self.deploys.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<(String, Uuid)> {
        self.operations.lock().unwrap().clone()
    }

    /// Make the next orchestrator call fail with a process error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CloudifyError::ProcessFailed {
                command: "docker".to_string(),
                exit_code: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, operation: &str, id: Uuid) -> Result<()> {
        self.check_failure()?;
        self.operations.lock().unwrap().push((operation.to_string(), id));
        Ok(())
    }
}

#[async_trait]
impl Orchestrator for StubOrchestrator {
    async fn deploy_environment(&self, environment_id: Uuid) -> Result<()> {
        self.check_failure()?;
        self.deploys.lock().unwrap().push(environment_id);
        Ok(())
    }

    async fn start_resource(&self, resource_id: Uuid) -> Result<()> {
        self.record("start", resource_id)
    }

    async fn stop_resource(&self, resource_id: Uuid) -> Result<()> {
        self.record("stop", resource_id)
    }

    async fn restart_resource(&self, resource_id: Uuid) -> Result<()> {
        self.record("restart", resource_id)
    }

    async fn scale_resource(&self, resource_id: Uuid, _replicas: u32) -> Result<()> {
        self.record("scale", resource_id)
    }

    async fn resource_logs(
        &self,
        resource_id: Uuid,
        _tail: u32,
        _service_name: Option<&str>,
    ) -> Result<String> {
        self.record("logs", resource_id)?;
        Ok("log output".to_string())
    }

    async fn resource_status(&self, resource_id: Uuid) -> Result<ResourceState> {
        self.record("status", resource_id)?;
        Ok(ResourceState::Running)
    }

    async fn resource_health(&self, resource_id: Uuid) -> Result<ResourceHealth> {
        self.record("health", resource_id)?;
        Ok(ResourceHealth::new(ResourceState::Running, HealthStatus::Healthy))
    }
}

/// Store wrapper whose port assignments always report a lost race.
///
/// Drives the add-resource retry loop through every attempt without needing
/// a real concurrent writer.
pub struct ContestedPortStore {
    inner: Arc<dyn StateStore>,
    pub attempts: Mutex<Vec<u16>>,
}

impl ContestedPortStore {
    pub fn new(inner: Arc<dyn StateStore>) -> Self {
        Self { inner, attempts: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl StateStore for ContestedPortStore {
    async fn add_resource_group(&self, group: &ResourceGroup) -> Result<()> {
        self.inner.add_resource_group(group).await
    }

    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>> {
        self.inner.list_resource_groups().await
    }

    async fn get_resource_group(&self, group_id: Uuid) -> Result<Option<ResourceGroup>> {
        self.inner.get_resource_group(group_id).await
    }

    async fn add_environment(&self, environment: &Environment) -> Result<()> {
        self.inner.add_environment(environment).await
    }

    async fn get_environment(&self, environment_id: Uuid) -> Result<Option<Environment>> {
        self.inner.get_environment(environment_id).await
    }

    async fn list_environments(&self, group_id: Uuid) -> Result<Vec<Environment>> {
        self.inner.list_environments(group_id).await
    }

    async fn add_resource(&self, resource: &Resource) -> Result<()> {
        self.inner.add_resource(resource).await
    }

    async fn get_resource(&self, resource_id: Uuid) -> Result<Option<Resource>> {
        self.inner.get_resource(resource_id).await
    }

    async fn list_resources(&self, environment_id: Uuid) -> Result<Vec<Resource>> {
        self.inner.list_resources(environment_id).await
    }

    async fn update_resource(&self, resource: &Resource) -> Result<()> {
        self.inner.update_resource(resource).await
    }

    async fn remove_resource(&self, resource_id: Uuid) -> Result<()> {
        self.inner.remove_resource(resource_id).await
    }

    async fn assign_port(
        &self,
        _environment_id: Uuid,
        _resource_id: Uuid,
        port: u16,
    ) -> Result<bool> {
        self.attempts.lock().unwrap().push(port);
        Ok(false)
    }

    async fn list_allocated_ports(&self, environment_id: Uuid) -> Result<Vec<u16>> {
        self.inner.list_allocated_ports(environment_id).await
    }

    async fn list_resource_ports(
        &self,
        environment_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<u16>> {
        self.inner.list_resource_ports(environment_id, resource_id).await
    }

    async fn remove_ports(&self, environment_id: Uuid, resource_id: Uuid) -> Result<()> {
        self.inner.remove_ports(environment_id, resource_id).await
    }
}
