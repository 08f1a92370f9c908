//! Port allocation for environment resources.
//!
//! The allocator only *proposes* a port; recording it is the caller's
//! responsibility via [`StateStore::assign_port`]. The propose and commit
//! steps are not atomic together, which is why resource creation runs a
//! retry loop around the pair.

use crate::error::{CloudifyError, Result};
use crate::state::StateStore;
use crate::types::ResourceKind;
use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

const MAX_PORT: u32 = 65_535;

/// A proposed port for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAllocation {
    /// The proposed host port.
    pub port: u16,
    /// Whether the caller explicitly requested this port.
    pub was_requested: bool,
}

/// Proposes free host ports for environment resources.
pub struct PortAllocator {
    store: Arc<dyn StateStore>,
}

impl PortAllocator {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Propose a port for a resource of the given type.
    ///
    /// A requested port must be unallocated in the environment and bindable
    /// on the host. Without a request, candidates start at the type-specific
    /// base ports and walk upward in lockstep until a free one is found.
    #[instrument(skip(self), fields(environment_id = %environment_id))]
    pub async fn allocate(
        &self,
        environment_id: Uuid,
        kind: ResourceKind,
        requested_port: Option<u16>,
    ) -> Result<PortAllocation> {
        let allocated: HashSet<u16> =
            self.store.list_allocated_ports(environment_id).await?.into_iter().collect();

        match requested_port {
            Some(port) => allocate_requested(&allocated, port),
            None => allocate_automatic(&allocated, kind),
        }
    }
}

fn allocate_requested(allocated: &HashSet<u16>, port: u16) -> Result<PortAllocation> {
    if port == 0 {
        return Err(CloudifyError::validation("Requested port must be between 1 and 65535."));
    }

    if allocated.contains(&port) {
        return Err(CloudifyError::PortConflict { port });
    }

    if !is_port_free(port) {
        return Err(CloudifyError::PortConflict { port });
    }

    Ok(PortAllocation { port, was_requested: true })
}

fn allocate_automatic(allocated: &HashSet<u16>, kind: ResourceKind) -> Result<PortAllocation> {
    let bases = base_ports(kind);

    for offset in 0..=MAX_PORT {
        for base in bases {
            let candidate = u32::from(*base) + offset;
            if candidate > MAX_PORT {
                continue;
            }

            let candidate = candidate as u16;
            if allocated.contains(&candidate) {
                continue;
            }

            if !is_port_free(candidate) {
                continue;
            }

            debug!(port = candidate, "Proposed automatic port");
            return Ok(PortAllocation { port: candidate, was_requested: false });
        }
    }

    Err(CloudifyError::PortExhausted {
        reason: format!("port range exhausted for resource type '{}'", kind.as_str()),
    })
}

/// Base ports for automatic allocation, per resource type.
fn base_ports(kind: ResourceKind) -> &'static [u16] {
    match kind {
        ResourceKind::Redis => &[6379],
        ResourceKind::Postgres => &[5432],
        ResourceKind::Mongo => &[27017],
        ResourceKind::Rabbit => &[5672, 15672],
        ResourceKind::AppService => &[8080, 5000],
    }
}

/// Whether a loopback listener can currently bind the port.
fn is_port_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}
