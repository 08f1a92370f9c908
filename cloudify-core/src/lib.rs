//! Cloudify Core Library
//!
//! Orchestration engine for small, multi-service local environments:
//! state store, deterministic compose manifest rendering, port allocation,
//! subprocess execution, and the lifecycle handlers that tie them together.

pub mod compose;
pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod orchestrator;
pub mod paths;
pub mod ports;
pub mod process;
pub mod state;
pub mod sysinfo;
pub mod types;

// Re-export commonly used items
pub use compose::ManifestRenderer;
pub use config::Config;
pub use error::{CloudifyError, Result};
pub use orchestrator::{ComposeOrchestrator, Orchestrator};
pub use ports::{PortAllocation, PortAllocator};
pub use process::{ExecOutcome, ExecRequest, ExecResult, ProcessRunner};
pub use state::{MemoryStateStore, SqliteStateStore, StateStore};
pub use sysinfo::{HostProfile, HostSystemProfile, SystemProfileProvider};
pub use types::{
    CapacityProfile, CredentialProfile, Environment, EnvironmentName, HealthStatus, NetworkMode,
    PortPolicy, Resource, ResourceGroup, ResourceHealth, ResourceKind, ResourceSpec,
    ResourceState, StorageProfile,
};
