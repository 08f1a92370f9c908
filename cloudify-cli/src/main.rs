use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "cloudify")]
#[command(about = "Cloudify local environment orchestration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage resource groups
    #[command(subcommand)]
    Group(GroupCommands),

    /// Manage environments
    #[command(subcommand)]
    Env(EnvCommands),

    /// Manage resources within an environment
    #[command(subcommand)]
    Resource(ResourceCommands),
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Create a resource group
    Create {
        /// Group name
        name: String,

        /// Tags (KEY=VALUE)
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// List resource groups
    Ls,
}

#[derive(Subcommand)]
enum EnvCommands {
    /// Create an environment under a resource group
    Create {
        /// Resource group ID
        group: Uuid,

        /// Environment name (prod, test, dev)
        #[arg(long, default_value = "dev")]
        name: String,

        /// Network mode (bridge, host, none)
        #[arg(long, default_value = "bridge")]
        network: String,

        /// Base domain for environment services
        #[arg(long)]
        domain: Option<String>,
    },

    /// List environments for a resource group
    Ls {
        /// Resource group ID
        group: Uuid,
    },

    /// Show a full environment overview
    Overview {
        /// Environment ID
        env: Uuid,
    },

    /// Print the rendered compose manifest
    Render {
        /// Environment ID
        env: Uuid,
    },
}

#[derive(Subcommand)]
enum ResourceCommands {
    /// Add a resource to an environment
    Add {
        /// Environment ID
        env: Uuid,

        /// Resource name
        #[arg(long)]
        name: String,

        /// Resource type (redis, postgres, mongo, rabbit, appservice)
        #[arg(long = "type")]
        kind: String,

        /// Explicitly requested host port
        #[arg(long)]
        port: Option<u16>,

        /// Declared container ports
        #[arg(long)]
        expose: Vec<u16>,

        /// Storage volume name
        #[arg(long)]
        volume: Option<String>,

        /// Storage size in GB
        #[arg(long, default_value = "1")]
        size_gb: u32,

        /// Storage mount path
        #[arg(long)]
        mount: Option<String>,

        /// Keep the volume across environment teardown
        #[arg(long)]
        persistent: bool,

        /// Credential username
        #[arg(long)]
        username: Option<String>,

        /// Credential password
        #[arg(long)]
        password: Option<String>,

        /// Container image (application services)
        #[arg(long)]
        image: Option<String>,

        /// HTTP health-check path (application services)
        #[arg(long)]
        health_path: Option<String>,

        /// Replica count
        #[arg(long)]
        replicas: Option<u32>,

        /// CPU limit in cores
        #[arg(long)]
        cpus: Option<u32>,

        /// Memory limit in GB
        #[arg(long)]
        memory_gb: Option<u32>,
    },

    /// Delete a resource and its port allocations
    Rm {
        /// Resource ID
        resource: Uuid,
    },

    /// Start a resource
    Start {
        /// Resource ID
        resource: Uuid,
    },

    /// Stop a resource
    Stop {
        /// Resource ID
        resource: Uuid,
    },

    /// Restart a resource
    Restart {
        /// Resource ID
        resource: Uuid,
    },

    /// Scale a resource to a replica count
    Scale {
        /// Resource ID
        resource: Uuid,

        /// Replica count
        replicas: u32,
    },

    /// Fetch resource logs
    Logs {
        /// Resource ID
        resource: Uuid,

        /// Number of log lines
        #[arg(long, default_value = "100")]
        tail: u32,

        /// Override the service name
        #[arg(long)]
        service: Option<String>,
    },

    /// Report resource health
    Health {
        /// Resource ID
        resource: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = commands::AppContext::init().await?;

    match cli.command {
        Commands::Group(GroupCommands::Create { name, tag }) => {
            commands::group_create(&ctx, name, tag).await
        }
        Commands::Group(GroupCommands::Ls) => commands::group_ls(&ctx).await,
        Commands::Env(EnvCommands::Create { group, name, network, domain }) => {
            commands::env_create(&ctx, group, name, network, domain).await
        }
        Commands::Env(EnvCommands::Ls { group }) => commands::env_ls(&ctx, group).await,
        Commands::Env(EnvCommands::Overview { env }) => commands::env_overview(&ctx, env).await,
        Commands::Env(EnvCommands::Render { env }) => commands::env_render(&ctx, env).await,
        Commands::Resource(ResourceCommands::Add {
            env,
            name,
            kind,
            port,
            expose,
            volume,
            size_gb,
            mount,
            persistent,
            username,
            password,
            image,
            health_path,
            replicas,
            cpus,
            memory_gb,
        }) => {
            commands::resource_add(
                &ctx,
                commands::ResourceAddArgs {
                    env,
                    name,
                    kind,
                    port,
                    expose,
                    volume,
                    size_gb,
                    mount,
                    persistent,
                    username,
                    password,
                    image,
                    health_path,
                    replicas,
                    cpus,
                    memory_gb,
                },
            )
            .await
        }
        Commands::Resource(ResourceCommands::Rm { resource }) => {
            commands::resource_rm(&ctx, resource).await
        }
        Commands::Resource(ResourceCommands::Start { resource }) => {
            commands::resource_start(&ctx, resource).await
        }
        Commands::Resource(ResourceCommands::Stop { resource }) => {
            commands::resource_stop(&ctx, resource).await
        }
        Commands::Resource(ResourceCommands::Restart { resource }) => {
            commands::resource_restart(&ctx, resource).await
        }
        Commands::Resource(ResourceCommands::Scale { resource, replicas }) => {
            commands::resource_scale(&ctx, resource, replicas).await
        }
        Commands::Resource(ResourceCommands::Logs { resource, tail, service }) => {
            commands::resource_logs(&ctx, resource, tail, service).await
        }
        Commands::Resource(ResourceCommands::Health { resource }) => {
            commands::resource_health(&ctx, resource).await
        }
    }
}
