//! Resource profile types.
//!
//! Profiles are immutable value objects validated at construction and
//! replaced wholesale on update, never mutated in place.

use crate::error::{CloudifyError, Result};
use serde::{Deserialize, Serialize};

/// Compute capacity requirements for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityProfile {
    /// Optional CPU limit in cores.
    pub cpu_limit: Option<u32>,
    /// Optional memory limit in gigabytes.
    pub memory_limit_gb: Option<u32>,
    /// Replica count, at least 1.
    pub replicas: u32,
    /// Optional free-form notes.
    pub notes: Option<String>,
}

impl CapacityProfile {
    pub fn new(
        cpu_limit: Option<u32>,
        memory_limit_gb: Option<u32>,
        replicas: u32,
        notes: Option<String>,
    ) -> Result<Self> {
        if cpu_limit == Some(0) {
            return Err(CloudifyError::validation("CPU limit must be greater than zero."));
        }
        if memory_limit_gb == Some(0) {
            return Err(CloudifyError::validation("Memory limit must be greater than zero."));
        }
        if replicas < 1 {
            return Err(CloudifyError::validation("Replicas must be at least 1."));
        }
        if let Some(notes) = &notes {
            if notes.trim().is_empty() {
                return Err(CloudifyError::validation("Notes cannot be empty."));
            }
        }

        Ok(Self { cpu_limit, memory_limit_gb, replicas, notes })
    }

    /// Copy of this profile with a different replica count.
    pub fn with_replicas(&self, replicas: u32) -> Result<Self> {
        Self::new(self.cpu_limit, self.memory_limit_gb, replicas, self.notes.clone())
    }
}

/// Storage requirements for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProfile {
    /// Volume name.
    pub volume_name: String,
    /// Volume size in gigabytes, at least 1.
    pub size_gb: u32,
    /// Mount path inside the container.
    pub mount_path: String,
    /// Whether the volume survives environment teardown.
    pub persistent: bool,
}

impl StorageProfile {
    pub fn new(
        volume_name: impl Into<String>,
        size_gb: u32,
        mount_path: impl Into<String>,
        persistent: bool,
    ) -> Result<Self> {
        let volume_name = volume_name.into();
        let mount_path = mount_path.into();

        if volume_name.trim().is_empty() {
            return Err(CloudifyError::validation("Storage volume name is required."));
        }
        if size_gb < 1 {
            return Err(CloudifyError::validation("Storage size must be at least 1 GB."));
        }
        if mount_path.trim().is_empty() {
            return Err(CloudifyError::validation("Storage mount path is required."));
        }

        Ok(Self { volume_name, size_gb, mount_path, persistent })
    }
}

/// Credential settings for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialProfile {
    pub username: String,
    pub password: String,
}

impl CredentialProfile {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.trim().is_empty() {
            return Err(CloudifyError::validation("Credential username is required."));
        }
        if password.trim().is_empty() {
            return Err(CloudifyError::validation("Credential password is required."));
        }

        Ok(Self { username, password })
    }
}

/// Declared port exposure policy, independent of allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPolicy {
    exposed_ports: Vec<u16>,
}

impl PortPolicy {
    /// Create a policy from the declared ports, preserving order.
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Result<Self> {
        let mut exposed_ports = Vec::new();
        for port in ports {
            if port == 0 {
                return Err(CloudifyError::validation("Ports must be between 1 and 65535."));
            }
            exposed_ports.push(port);
        }
        Ok(Self { exposed_ports })
    }

    /// Declared ports in declaration order.
    pub fn exposed_ports(&self) -> &[u16] {
        &self.exposed_ports
    }

    /// Whether the policy declares no ports.
    pub fn is_empty(&self) -> bool {
        self.exposed_ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_profile_rejects_zero_limits() {
        assert!(CapacityProfile::new(Some(0), None, 1, None).is_err());
        assert!(CapacityProfile::new(None, Some(0), 1, None).is_err());
        assert!(CapacityProfile::new(None, None, 0, None).is_err());
        assert!(CapacityProfile::new(Some(2), Some(4), 3, None).is_ok());
    }

    #[test]
    fn test_capacity_profile_blank_notes_rejected() {
        assert!(CapacityProfile::new(None, None, 1, Some("   ".into())).is_err());
    }

    #[test]
    fn test_storage_profile_validation() {
        assert!(StorageProfile::new("", 1, "/data", true).is_err());
        assert!(StorageProfile::new("vol", 0, "/data", true).is_err());
        assert!(StorageProfile::new("vol", 1, " ", true).is_err());
        assert!(StorageProfile::new("vol", 20, "/data", false).is_ok());
    }

    #[test]
    fn test_port_policy_rejects_zero() {
        assert!(PortPolicy::new([0]).is_err());
        let policy = PortPolicy::new([8080, 9090]).unwrap();
        assert_eq!(policy.exposed_ports(), &[8080, 9090]);
    }
}
