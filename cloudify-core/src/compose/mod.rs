//! Deterministic compose manifest rendering.
//!
//! The renderer is a pure function of state-store data: rendering the same
//! resources and port allocations twice yields byte-identical output.
//! Services and volumes are sorted by name, environment maps by key, and
//! scalars needing escaping are single-quoted with internal quotes doubled.

pub mod naming;

#[cfg(test)]
mod renderer_tests;

use crate::error::Result;
use crate::state::StateStore;
use crate::types::{Resource, ResourceKind, ResourceSpec};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const COMPOSE_VERSION: &str = "3.9";
const HOST_ADDRESS: &str = "localhost";
const HEALTHCHECK_INTERVAL: &str = "10s";
const HEALTHCHECK_TIMEOUT: &str = "5s";
const HEALTHCHECK_RETRIES: u32 = 5;

/// Renders compose manifests for environments.
pub struct ManifestRenderer {
    store: Arc<dyn StateStore>,
}

struct ServiceDefinition {
    name: String,
    image: String,
    // (host, container) pairs
    ports: Vec<(u16, u16)>,
    environment: BTreeMap<String, String>,
    // (volume name, mount path) pairs
    volumes: Vec<(String, String)>,
    healthcheck: Option<Vec<String>>,
}

impl ManifestRenderer {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Render the compose document for an environment.
    #[instrument(skip(self), fields(environment_id = %environment_id))]
    pub async fn render(&self, environment_id: Uuid) -> Result<String> {
        let resources = self.store.list_resources(environment_id).await?;

        let mut services = Vec::new();
        let mut volumes: BTreeMap<String, String> = BTreeMap::new();

        for resource in &resources {
            let host_ports =
                self.store.list_resource_ports(environment_id, resource.id).await?;
            services.push(build_service(environment_id, resource, &host_ports, &mut volumes));
        }

        services.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(render_yaml(&services, &volumes))
    }
}

fn build_service(
    environment_id: Uuid,
    resource: &Resource,
    host_ports: &[u16],
    volumes: &mut BTreeMap<String, String>,
) -> ServiceDefinition {
    let name = naming::service_name(resource);
    let image = resolve_image(resource);
    let container_ports = resolve_container_ports(resource);
    let ports = zip_port_mappings(host_ports, &container_ports);
    let environment = build_environment(resource);
    let healthcheck = build_healthcheck(resource);

    let mut mounts = Vec::new();
    if let Some(storage) = resource.storage() {
        let volume = naming::volume_name(environment_id, resource.id);
        volumes.entry(volume.clone()).or_insert_with(|| volume.clone());
        mounts.push((volume, storage.mount_path.clone()));
    }

    ServiceDefinition { name, image, ports, environment, volumes: mounts, healthcheck }
}

/// Container image for the resource; fixed defaults per type, the
/// application service supplies its own.
fn resolve_image(resource: &Resource) -> String {
    match &resource.spec {
        ResourceSpec::Redis { .. } => "redis:7.2.4".to_string(),
        ResourceSpec::Postgres { .. } => "postgres:16.4".to_string(),
        ResourceSpec::Mongo { .. } => "mongo:7.0.12".to_string(),
        ResourceSpec::Rabbit { .. } => "rabbitmq:3.12.14-management".to_string(),
        ResourceSpec::AppService { image, .. } => image.clone(),
    }
}

/// Declared ports sorted ascending, falling back to per-type defaults.
fn resolve_container_ports(resource: &Resource) -> Vec<u16> {
    if let Some(policy) = &resource.port_policy {
        let mut ports = policy.exposed_ports().to_vec();
        ports.sort_unstable();
        return ports;
    }

    match resource.kind() {
        ResourceKind::Redis => vec![6379],
        ResourceKind::Postgres => vec![5432],
        ResourceKind::Mongo => vec![27017],
        ResourceKind::Rabbit => vec![5672, 15672],
        ResourceKind::AppService => Vec::new(),
    }
}

/// Host and container ports zipped in ascending order, truncated to the
/// shorter of the two lists.
fn zip_port_mappings(host_ports: &[u16], container_ports: &[u16]) -> Vec<(u16, u16)> {
    let mut hosts = host_ports.to_vec();
    hosts.sort_unstable();
    hosts.into_iter().zip(container_ports.iter().copied()).collect()
}

fn build_environment(resource: &Resource) -> BTreeMap<String, String> {
    let mut environment = BTreeMap::new();
    match &resource.spec {
        ResourceSpec::Postgres { credentials, .. } => {
            environment.insert("POSTGRES_USER".to_string(), credentials.username.clone());
            environment.insert("POSTGRES_PASSWORD".to_string(), credentials.password.clone());
        }
        ResourceSpec::Mongo { credentials, .. } => {
            environment
                .insert("MONGO_INITDB_ROOT_USERNAME".to_string(), credentials.username.clone());
            environment
                .insert("MONGO_INITDB_ROOT_PASSWORD".to_string(), credentials.password.clone());
        }
        ResourceSpec::Rabbit { credentials, .. } => {
            environment.insert("RABBITMQ_DEFAULT_USER".to_string(), credentials.username.clone());
            environment.insert("RABBITMQ_DEFAULT_PASS".to_string(), credentials.password.clone());
        }
        ResourceSpec::Redis { .. } | ResourceSpec::AppService { .. } => {}
    }
    environment
}

fn build_healthcheck(resource: &Resource) -> Option<Vec<String>> {
    match &resource.spec {
        ResourceSpec::Postgres { credentials, .. } => Some(vec![
            "CMD-SHELL".to_string(),
            format!("pg_isready -U {}", credentials.username),
        ]),
        ResourceSpec::Mongo { credentials, .. } => Some(vec![
            "CMD-SHELL".to_string(),
            format!(
                "mongosh --username \"{}\" --password \"{}\" --eval \"db.adminCommand('ping')\"",
                credentials.username, credentials.password
            ),
        ]),
        ResourceSpec::Rabbit { .. } => Some(vec![
            "CMD".to_string(),
            "rabbitmq-diagnostics".to_string(),
            "ping".to_string(),
        ]),
        ResourceSpec::Redis { .. } => {
            Some(vec!["CMD".to_string(), "redis-cli".to_string(), "ping".to_string()])
        }
        ResourceSpec::AppService { .. } => None,
    }
}

fn render_yaml(services: &[ServiceDefinition], volumes: &BTreeMap<String, String>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "version: \"{}\"", COMPOSE_VERSION);
    let _ = writeln!(out, "services:");

    for service in services {
        let _ = writeln!(out, "  {}:", service.name);
        let _ = writeln!(out, "    image: \"{}\"", service.image);

        if !service.ports.is_empty() {
            let _ = writeln!(out, "    ports:");
            for (host, container) in &service.ports {
                let _ = writeln!(out, "      - \"{}:{}:{}\"", HOST_ADDRESS, host, container);
            }
        }

        if !service.environment.is_empty() {
            let _ = writeln!(out, "    environment:");
            for (key, value) in &service.environment {
                let _ = writeln!(out, "      {}: {}", key, quote_yaml(value));
            }
        }

        if !service.volumes.is_empty() {
            let _ = writeln!(out, "    volumes:");
            for (volume, mount_path) in &service.volumes {
                let _ = writeln!(out, "      - \"{}:{}\"", volume, mount_path);
            }
        }

        if let Some(test) = &service.healthcheck {
            let _ = writeln!(out, "    healthcheck:");
            let _ = writeln!(out, "      test:");
            for segment in test {
                let _ = writeln!(out, "        - {}", quote_yaml(segment));
            }
            let _ = writeln!(out, "      interval: \"{}\"", HEALTHCHECK_INTERVAL);
            let _ = writeln!(out, "      timeout: \"{}\"", HEALTHCHECK_TIMEOUT);
            let _ = writeln!(out, "      retries: {}", HEALTHCHECK_RETRIES);
        }
    }

    if !volumes.is_empty() {
        let _ = writeln!(out, "volumes:");
        for name in volumes.keys() {
            let _ = writeln!(out, "  {}:", name);
            let _ = writeln!(out, "    name: \"{}\"", name);
        }
    }

    out
}

/// Single-quote a YAML scalar, doubling internal quotes.
fn quote_yaml(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
