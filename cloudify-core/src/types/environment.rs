//! Environment domain types.

use crate::error::{CloudifyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical environment name used for lifecycle separation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentName {
    Prod,
    Test,
    Dev,
}

impl EnvironmentName {
    /// Parse a name from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "prod" => Some(Self::Prod),
            "test" => Some(Self::Test),
            "dev" => Some(Self::Dev),
            _ => None,
        }
    }

    /// String representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }
}

/// Networking mode for environment resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Bridge,
    Host,
    None,
}

impl NetworkMode {
    /// Parse a mode from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bridge" => Some(Self::Bridge),
            "host" => Some(Self::Host),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// String representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Host => "host",
            Self::None => "none",
        }
    }
}

/// A named, network-scoped collection of resources deployed together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Environment identifier.
    pub id: Uuid,
    /// Owning resource group.
    pub resource_group_id: Uuid,
    /// Logical name.
    pub name: EnvironmentName,
    /// Network mode.
    pub network_mode: NetworkMode,
    /// Optional base domain for environment services.
    pub base_domain: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Environment {
    /// Create an environment with validated fields.
    pub fn new(
        id: Uuid,
        resource_group_id: Uuid,
        name: EnvironmentName,
        network_mode: NetworkMode,
        base_domain: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if let Some(domain) = &base_domain {
            if domain.trim().is_empty() {
                return Err(CloudifyError::validation("Base domain cannot be empty."));
            }
        }

        Ok(Self { id, resource_group_id, name, network_mode, base_domain, created_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_name_roundtrip() {
        for name in [EnvironmentName::Prod, EnvironmentName::Test, EnvironmentName::Dev] {
            assert_eq!(EnvironmentName::parse(name.as_str()), Some(name));
        }
        assert_eq!(EnvironmentName::parse("staging"), None);
    }

    #[test]
    fn test_blank_base_domain_rejected() {
        let err = Environment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            EnvironmentName::Dev,
            NetworkMode::Bridge,
            Some("  ".to_string()),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CloudifyError::Validation { .. }));
    }
}
