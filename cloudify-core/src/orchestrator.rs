//! Compose-based orchestration for environments.
//!
//! Resource runtime state is externalized through the wrapped compose CLI
//! rather than modeled in memory: every lifecycle intent becomes a CLI
//! invocation against the environment's generated manifest, and status is
//! recovered by parsing `ps --format json`.

use crate::compose::{naming, ManifestRenderer};
use crate::config::Config;
use crate::error::{CloudifyError, Result};
use crate::process::{ExecRequest, ExecResult, ProcessRunner};
use crate::state::StateStore;
use crate::types::{HealthStatus, Resource, ResourceHealth, ResourceSpec, ResourceState};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

/// Lifecycle operations against the external container runtime.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Render and apply the environment manifest (`up -d`).
    async fn deploy_environment(&self, environment_id: Uuid) -> Result<()>;

    /// Start a resource's service.
    async fn start_resource(&self, resource_id: Uuid) -> Result<()>;

    /// Stop a resource's service.
    async fn stop_resource(&self, resource_id: Uuid) -> Result<()>;

    /// Restart a resource's service.
    async fn restart_resource(&self, resource_id: Uuid) -> Result<()>;

    /// Scale a resource's service to the given replica count.
    async fn scale_resource(&self, resource_id: Uuid, replicas: u32) -> Result<()>;

    /// Fetch the last `tail` log lines for a resource, optionally overriding
    /// the service name.
    async fn resource_logs(
        &self,
        resource_id: Uuid,
        tail: u32,
        service_name: Option<&str>,
    ) -> Result<String>;

    /// Current runtime state as reported by the CLI.
    async fn resource_status(&self, resource_id: Uuid) -> Result<ResourceState>;

    /// Current state and health as reported by the CLI.
    async fn resource_health(&self, resource_id: Uuid) -> Result<ResourceHealth>;
}

/// Orchestrator implementation driving an external compose CLI.
pub struct ComposeOrchestrator {
    renderer: ManifestRenderer,
    store: Arc<dyn StateStore>,
    runner: ProcessRunner,
    config: Config,
    cancel: CancellationToken,
}

impl ComposeOrchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        runner: ProcessRunner,
        config: Config,
        cancel: CancellationToken,
    ) -> Self {
        Self { renderer: ManifestRenderer::new(store.clone()), store, runner, config, cancel }
    }

    fn environment_dir(&self, environment_id: Uuid) -> PathBuf {
        PathBuf::from(&self.config.environments_dir).join(environment_id.to_string())
    }

    fn compose_file_path(&self, environment_id: Uuid) -> PathBuf {
        self.environment_dir(environment_id).join("docker-compose.yml")
    }

    async fn get_resource(&self, resource_id: Uuid) -> Result<Resource> {
        self.store
            .get_resource(resource_id)
            .await?
            .ok_or(CloudifyError::ResourceNotFound { resource_id })
    }

    fn build_compose_args(&self, environment_id: Uuid, command_args: &[String]) -> Vec<String> {
        let mut args = vec![
            self.config.compose_subcommand.clone(),
            "--project-name".to_string(),
            naming::project_name(environment_id),
            "--file".to_string(),
            self.compose_file_path(environment_id).to_string_lossy().to_string(),
        ];

        if self.config.dry_run {
            args.push("--dry-run".to_string());
        }

        args.extend_from_slice(command_args);
        args
    }

    async fn run_compose(
        &self,
        environment_id: Uuid,
        command_args: Vec<String>,
    ) -> Result<ExecResult> {
        let args = self.build_compose_args(environment_id, &command_args);
        let request = ExecRequest {
            program: self.config.compose_command.clone(),
            args,
            working_dir: Some(self.environment_dir(environment_id)),
            timeout: self.config.command_timeout(),
        };

        self.runner.run(request, &self.cancel).await
    }
}

#[async_trait]
impl Orchestrator for ComposeOrchestrator {
    #[instrument(skip(self), fields(environment_id = %environment_id))]
    async fn deploy_environment(&self, environment_id: Uuid) -> Result<()> {
        let manifest = self.renderer.render(environment_id).await?;
        let dir = self.environment_dir(environment_id);
        let path = self.compose_file_path(environment_id);
        let resources = self.store.list_resources(environment_id).await?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CloudifyError::IoError { path: dir.clone(), source: e })?;
        tokio::fs::write(&path, &manifest)
            .await
            .map_err(|e| CloudifyError::IoError { path: path.clone(), source: e })?;

        info!(path = %path.display(), services = resources.len(), "Deploying environment");

        let result = self.run_compose(environment_id, build_deploy_args(&resources)).await?;
        result.ensure_success(&self.config.compose_command)
    }

    #[instrument(skip(self), fields(resource_id = %resource_id))]
    async fn start_resource(&self, resource_id: Uuid) -> Result<()> {
        let resource = self.get_resource(resource_id).await?;
        let service = naming::service_name(&resource);

        let result = self
            .run_compose(resource.environment_id, vec!["start".to_string(), service])
            .await?;
        result.ensure_success(&self.config.compose_command)
    }

    #[instrument(skip(self), fields(resource_id = %resource_id))]
    async fn stop_resource(&self, resource_id: Uuid) -> Result<()> {
        let resource = self.get_resource(resource_id).await?;
        let service = naming::service_name(&resource);

        let result = self
            .run_compose(resource.environment_id, vec!["stop".to_string(), service])
            .await?;
        result.ensure_success(&self.config.compose_command)
    }

    #[instrument(skip(self), fields(resource_id = %resource_id))]
    async fn restart_resource(&self, resource_id: Uuid) -> Result<()> {
        let resource = self.get_resource(resource_id).await?;
        let service = naming::service_name(&resource);

        let result = self
            .run_compose(resource.environment_id, vec!["restart".to_string(), service])
            .await?;
        result.ensure_success(&self.config.compose_command)
    }

    #[instrument(skip(self), fields(resource_id = %resource_id, replicas = replicas))]
    async fn scale_resource(&self, resource_id: Uuid, replicas: u32) -> Result<()> {
        let resource = self.get_resource(resource_id).await?;
        let service = naming::service_name(&resource);

        let result = self
            .run_compose(
                resource.environment_id,
                vec![
                    "up".to_string(),
                    "-d".to_string(),
                    "--scale".to_string(),
                    format!("{}={}", service, replicas),
                    service,
                ],
            )
            .await?;
        result.ensure_success(&self.config.compose_command)
    }

    #[instrument(skip(self), fields(resource_id = %resource_id, tail = tail))]
    async fn resource_logs(
        &self,
        resource_id: Uuid,
        tail: u32,
        service_name: Option<&str>,
    ) -> Result<String> {
        let resource = self.get_resource(resource_id).await?;
        let service = match service_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => naming::service_name(&resource),
        };

        let result = self
            .run_compose(
                resource.environment_id,
                vec!["logs".to_string(), "--tail".to_string(), tail.to_string(), service],
            )
            .await?;
        result.ensure_success(&self.config.compose_command)?;
        Ok(result.stdout.trim_end().to_string())
    }

    #[instrument(skip(self), fields(resource_id = %resource_id))]
    async fn resource_status(&self, resource_id: Uuid) -> Result<ResourceState> {
        Ok(self.resource_health(resource_id).await?.state)
    }

    #[instrument(skip(self), fields(resource_id = %resource_id))]
    async fn resource_health(&self, resource_id: Uuid) -> Result<ResourceHealth> {
        let resource = self.get_resource(resource_id).await?;
        let service = naming::service_name(&resource);

        let result = self
            .run_compose(
                resource.environment_id,
                vec!["ps".to_string(), "--format".to_string(), "json".to_string()],
            )
            .await?;
        result.ensure_success(&self.config.compose_command)?;

        Ok(parse_resource_health(&result.stdout, &service))
    }
}

/// Deploy arguments: `up -d` plus a `--scale` flag for every application
/// service requesting more than one replica.
fn build_deploy_args(resources: &[Resource]) -> Vec<String> {
    let mut args = vec!["up".to_string(), "-d".to_string()];

    for resource in resources {
        if !matches!(resource.spec, ResourceSpec::AppService { .. }) {
            continue;
        }

        let replicas = resource.replicas();
        if replicas <= 1 {
            continue;
        }

        args.push("--scale".to_string());
        args.push(format!("{}={}", naming::service_name(resource), replicas));
    }

    args
}

#[derive(Debug, Deserialize)]
struct ComposeServiceStatus {
    #[serde(rename = "Service", alias = "service")]
    service: Option<String>,
    #[serde(rename = "State", alias = "state")]
    state: Option<String>,
    #[serde(rename = "Health", alias = "health")]
    health: Option<String>,
}

/// Parse `ps --format json` output into a health snapshot for one service.
fn parse_resource_health(output: &str, service_name: &str) -> ResourceHealth {
    if output.trim().is_empty() {
        return ResourceHealth::new(ResourceState::Stopped, HealthStatus::Unknown);
    }

    let services: Vec<ComposeServiceStatus> = match serde_json::from_str(output) {
        Ok(services) => services,
        Err(_) => return ResourceHealth::new(ResourceState::Failed, HealthStatus::Unknown),
    };

    let entry = services.iter().find(|s| {
        s.service.as_deref().is_some_and(|name| name.eq_ignore_ascii_case(service_name))
    });

    let Some(entry) = entry else {
        return ResourceHealth::new(ResourceState::Deleted, HealthStatus::Unknown);
    };

    let state = entry.state.as_deref().unwrap_or_default().to_lowercase();
    let health = entry.health.as_deref().unwrap_or_default().to_lowercase();

    ResourceHealth::new(map_state(&state, &health), map_health(&state, &health))
}

fn map_state(state: &str, health: &str) -> ResourceState {
    if state.contains("running") {
        if health.contains("unhealthy") {
            return ResourceState::Failed;
        }
        return ResourceState::Running;
    }

    if state.contains("exited") || state.contains("stopped") {
        return ResourceState::Stopped;
    }

    if state.contains("created") || state.contains("restarting") {
        return ResourceState::Provisioning;
    }

    ResourceState::Failed
}

fn map_health(state: &str, health: &str) -> HealthStatus {
    if state.contains("running") {
        if health.contains("unhealthy") {
            return HealthStatus::Unhealthy;
        }
        return HealthStatus::Healthy;
    }

    if state.contains("exited") || state.contains("stopped") {
        return HealthStatus::Unhealthy;
    }

    if state.contains("created") || state.contains("restarting") {
        return HealthStatus::Unknown;
    }

    HealthStatus::Unknown
}
