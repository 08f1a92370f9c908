//! Command implementations wiring the core engine together.

use anyhow::{anyhow, bail, Result};
use cloudify_core::handlers::add_resource::{
    AddResourceRequest, CapacitySpec, CredentialSpec, StorageSpec,
};
use cloudify_core::handlers::{
    AddResourceHandler, CreateEnvironmentHandler, CreateEnvironmentRequest,
    CreateResourceGroupHandler, CreateResourceGroupRequest, EnvironmentOverviewHandler,
    ListEnvironmentsHandler, ListResourceGroupsHandler, ResourceHealthHandler,
    ResourceLifecycleHandler, ResourceLogsHandler, ResourceSummary,
};
use cloudify_core::{
    observability, paths, ComposeOrchestrator, Config, EnvironmentName, HostSystemProfile,
    ManifestRenderer, NetworkMode, Orchestrator, PortAllocator, ProcessRunner, ResourceKind,
    SqliteStateStore, StateStore,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Shared wiring for every command invocation.
pub struct AppContext {
    pub store: Arc<dyn StateStore>,
    pub orchestrator: Arc<dyn Orchestrator>,
}

impl AppContext {
    /// Load configuration, set up tracing, open the store, and wire the
    /// orchestrator with a ctrl-c cancellation token.
    pub async fn init() -> Result<Self> {
        let config = Config::load()?;
        observability::init(&config.log_level).map_err(|e| anyhow!(e.to_string()))?;

        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::new(paths::db_path()).await?);

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        let orchestrator: Arc<dyn Orchestrator> = Arc::new(ComposeOrchestrator::new(
            store.clone(),
            ProcessRunner::new(),
            config,
            cancel,
        ));

        Ok(Self { store, orchestrator })
    }

    fn lifecycle(&self) -> ResourceLifecycleHandler {
        ResourceLifecycleHandler::new(self.store.clone(), self.orchestrator.clone())
    }
}

pub async fn group_create(ctx: &AppContext, name: String, tags: Vec<String>) -> Result<()> {
    let tags = tags
        .iter()
        .map(|tag| {
            tag.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("Invalid tag format (expected KEY=VALUE): {}", tag))
        })
        .collect::<Result<Vec<_>>>()?;

    let group = CreateResourceGroupHandler::new(ctx.store.clone())
        .handle(CreateResourceGroupRequest { name, tags })
        .await?;

    println!("Created resource group {} ({})", group.name, group.id);
    Ok(())
}

pub async fn group_ls(ctx: &AppContext) -> Result<()> {
    let groups = ListResourceGroupsHandler::new(ctx.store.clone()).handle().await?;

    if groups.is_empty() {
        println!("No resource groups.");
        return Ok(());
    }

    for group in groups {
        let tags: Vec<String> =
            group.tags().iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        println!("{}  {}  [{}]", group.id, group.name, tags.join(", "));
    }
    Ok(())
}

pub async fn env_create(
    ctx: &AppContext,
    group: Uuid,
    name: String,
    network: String,
    domain: Option<String>,
) -> Result<()> {
    let name = EnvironmentName::parse(&name)
        .ok_or_else(|| anyhow!("Unknown environment name: {}", name))?;
    let network_mode =
        NetworkMode::parse(&network).ok_or_else(|| anyhow!("Unknown network mode: {}", network))?;

    let environment = CreateEnvironmentHandler::new(ctx.store.clone(), ctx.orchestrator.clone())
        .handle(CreateEnvironmentRequest {
            resource_group_id: group,
            name,
            network_mode,
            base_domain: domain,
        })
        .await?;

    println!("Created {} environment {}", environment.name.as_str(), environment.id);
    Ok(())
}

pub async fn env_ls(ctx: &AppContext, group: Uuid) -> Result<()> {
    let environments = ListEnvironmentsHandler::new(ctx.store.clone()).handle(group).await?;

    if environments.is_empty() {
        println!("No environments.");
        return Ok(());
    }

    for environment in environments {
        println!(
            "{}  {}  network={}  domain={}",
            environment.id,
            environment.name.as_str(),
            environment.network_mode.as_str(),
            environment.base_domain.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub async fn env_overview(ctx: &AppContext, env: Uuid) -> Result<()> {
    let overview =
        EnvironmentOverviewHandler::new(ctx.store.clone(), Arc::new(HostSystemProfile::new()))
            .handle(env)
            .await?;

    println!(
        "Environment {} ({}, network={})",
        overview.environment.id,
        overview.environment.name.as_str(),
        overview.environment.network_mode.as_str(),
    );
    println!(
        "Host: {} CPUs, {} GB memory, {} GB disk available",
        overview.host_profile.cpu_count,
        overview.host_profile.total_memory_gb,
        overview
            .host_profile
            .available_disk_gb
            .map(|gb| gb.to_string())
            .unwrap_or_else(|| "?".to_string()),
    );

    if overview.resources.is_empty() {
        println!("No resources.");
    } else {
        for resource in &overview.resources {
            print_resource(resource);
        }
    }

    println!("--- compose manifest ---");
    print!("{}", overview.compose_yaml);
    Ok(())
}

pub async fn env_render(ctx: &AppContext, env: Uuid) -> Result<()> {
    let yaml = ManifestRenderer::new(ctx.store.clone()).render(env).await?;
    print!("{}", yaml);
    Ok(())
}

/// Arguments for `resource add`.
pub struct ResourceAddArgs {
    pub env: Uuid,
    pub name: String,
    pub kind: String,
    pub port: Option<u16>,
    pub expose: Vec<u16>,
    pub volume: Option<String>,
    pub size_gb: u32,
    pub mount: Option<String>,
    pub persistent: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub health_path: Option<String>,
    pub replicas: Option<u32>,
    pub cpus: Option<u32>,
    pub memory_gb: Option<u32>,
}

pub async fn resource_add(ctx: &AppContext, args: ResourceAddArgs) -> Result<()> {
    let kind = ResourceKind::parse(&args.kind)
        .ok_or_else(|| anyhow!("Unknown resource type: {}", args.kind))?;

    let storage = match (&args.volume, &args.mount) {
        (Some(volume), Some(mount)) => Some(StorageSpec {
            volume_name: volume.clone(),
            size_gb: args.size_gb,
            mount_path: mount.clone(),
            persistent: args.persistent,
        }),
        (None, None) => None,
        _ => bail!("--volume and --mount must be provided together"),
    };

    let credentials = match (&args.username, &args.password) {
        (Some(username), Some(password)) => {
            Some(CredentialSpec { username: username.clone(), password: password.clone() })
        }
        (None, None) => None,
        _ => bail!("--username and --password must be provided together"),
    };

    let capacity = if args.replicas.is_some() || args.cpus.is_some() || args.memory_gb.is_some() {
        Some(CapacitySpec {
            cpu_limit: args.cpus,
            memory_limit_gb: args.memory_gb,
            replicas: args.replicas.unwrap_or(1),
            notes: None,
        })
    } else {
        None
    };

    let handler = AddResourceHandler::new(
        ctx.store.clone(),
        PortAllocator::new(ctx.store.clone()),
        ctx.orchestrator.clone(),
    );
    let response = handler
        .handle(AddResourceRequest {
            environment_id: args.env,
            name: args.name,
            kind,
            requested_port: args.port,
            exposed_ports: args.expose,
            capacity,
            storage,
            credentials,
            image: args.image,
            health_endpoint: args.health_path,
        })
        .await?;

    print_resource(&response.resource);
    Ok(())
}

pub async fn resource_rm(ctx: &AppContext, resource: Uuid) -> Result<()> {
    ctx.lifecycle().delete(resource).await?;
    println!("Deleted resource {}", resource);
    Ok(())
}

pub async fn resource_start(ctx: &AppContext, resource: Uuid) -> Result<()> {
    let resource = ctx.lifecycle().start(resource).await?;
    println!("Resource {} is {}", resource.id, resource.state.as_str());
    Ok(())
}

pub async fn resource_stop(ctx: &AppContext, resource: Uuid) -> Result<()> {
    let resource = ctx.lifecycle().stop(resource).await?;
    println!("Resource {} is {}", resource.id, resource.state.as_str());
    Ok(())
}

pub async fn resource_restart(ctx: &AppContext, resource: Uuid) -> Result<()> {
    let resource = ctx.lifecycle().restart(resource).await?;
    println!("Resource {} is {}", resource.id, resource.state.as_str());
    Ok(())
}

pub async fn resource_scale(ctx: &AppContext, resource: Uuid, replicas: u32) -> Result<()> {
    let resource = ctx.lifecycle().scale(resource, replicas).await?;
    println!("Resource {} scaled to {} replicas", resource.id, resource.replicas());
    Ok(())
}

pub async fn resource_logs(
    ctx: &AppContext,
    resource: Uuid,
    tail: u32,
    service: Option<String>,
) -> Result<()> {
    let logs = ResourceLogsHandler::new(ctx.store.clone(), ctx.orchestrator.clone())
        .handle(resource, tail, service.as_deref())
        .await?;
    println!("{}", logs);
    Ok(())
}

pub async fn resource_health(ctx: &AppContext, resource: Uuid) -> Result<()> {
    let health = ResourceHealthHandler::new(ctx.store.clone(), ctx.orchestrator.clone())
        .handle(resource)
        .await?;
    println!("state={} health={}", health.state.as_str(), health.status.as_str());
    Ok(())
}

fn print_resource(resource: &ResourceSummary) {
    let connection = resource
        .connection
        .as_ref()
        .map(|c| format!("{}:{}", c.host, c.port))
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{}  {}  type={}  state={}  connection={}",
        resource.id,
        resource.name,
        resource.kind.as_str(),
        resource.state.as_str(),
        connection,
    );
}
