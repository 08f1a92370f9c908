//! State management with SQLite persistence.
//!
//! The state store tracks all persistent state for Cloudify:
//! - Resource groups and their tags
//! - Environments
//! - Resources and their profiles
//! - Port allocations
//!
//! Port assignment is the one operation with a concurrency contract:
//! `assign_port` must be atomic and fail closed, returning `false` when the
//! (environment, port) pair is already taken. Callers treat that `false` as
//! the only authoritative conflict signal.

use crate::error::{CloudifyError, Result};
use crate::types::{Environment, EnvironmentName, NetworkMode, Resource, ResourceGroup};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, instrument};
use uuid::Uuid;

pub mod memory;
pub mod migrations;


pub use memory::MemoryStateStore;

/// Persistence operations for resource groups, environments, resources,
/// and port allocations.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Add a resource group.
    async fn add_resource_group(&self, group: &ResourceGroup) -> Result<()>;

    /// List all resource groups in creation order.
    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>>;

    /// Get a resource group by identifier.
    async fn get_resource_group(&self, group_id: Uuid) -> Result<Option<ResourceGroup>>;

    /// Add an environment.
    async fn add_environment(&self, environment: &Environment) -> Result<()>;

    /// Get an environment by identifier.
    async fn get_environment(&self, environment_id: Uuid) -> Result<Option<Environment>>;

    /// List environments for a resource group in creation order.
    async fn list_environments(&self, group_id: Uuid) -> Result<Vec<Environment>>;

    /// Add a resource.
    async fn add_resource(&self, resource: &Resource) -> Result<()>;

    /// Get a resource by identifier.
    async fn get_resource(&self, resource_id: Uuid) -> Result<Option<Resource>>;

    /// List resources for an environment in creation order.
    async fn list_resources(&self, environment_id: Uuid) -> Result<Vec<Resource>>;

    /// Update a resource, replacing profiles wholesale.
    async fn update_resource(&self, resource: &Resource) -> Result<()>;

    /// Remove a resource and, through the schema, its port allocations.
    async fn remove_resource(&self, resource_id: Uuid) -> Result<()>;

    /// Atomically assign a port to a resource within an environment.
    ///
    /// Returns `true` when the assignment was newly recorded and `false` when
    /// the port is already taken in that environment. Never overwrites.
    async fn assign_port(
        &self,
        environment_id: Uuid,
        resource_id: Uuid,
        port: u16,
    ) -> Result<bool>;

    /// List allocated ports for an environment, sorted ascending.
    async fn list_allocated_ports(&self, environment_id: Uuid) -> Result<Vec<u16>>;

    /// List allocated ports for one resource, sorted ascending.
    async fn list_resource_ports(
        &self,
        environment_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<u16>>;

    /// Remove all ports assigned to a resource.
    async fn remove_ports(&self, environment_id: Uuid, resource_id: Uuid) -> Result<()>;
}

/// SQLite-backed state store.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Create a store with an in-memory database (for tests).
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    /// Get a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a store with a database at the specified path.
    #[instrument(skip(db_path))]
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing state store at {:?}", db_path);

        let in_memory = db_path == Path::new(":memory:");
        if !in_memory {
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    CloudifyError::InvalidConfig {
                        reason: format!("Failed to create directory {}: {}", parent.display(), e),
                    }
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_path.to_str().ok_or_else(|| {
            CloudifyError::InvalidConfig { reason: "Invalid database path".to_string() }
        })?)
        .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true);

        // An in-memory pool must stay on one connection: every new connection
        // would otherwise open its own empty database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        let store = Self { pool };
        migrations::run(&store.pool).await?;

        info!("State store initialized successfully");
        Ok(store)
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    #[instrument(skip(self, group), fields(group_id = %group.id))]
    async fn add_resource_group(&self, group: &ResourceGroup) -> Result<()> {
        let tags_json = serde_json::to_string(group.tags())
            .map_err(|e| CloudifyError::DatabaseError(format!("Failed to serialize tags: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO resource_groups (id, name, created_at, tags)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(group.created_at.timestamp())
        .bind(tags_json)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("cloudify_db_errors_total", "operation" => "add_resource_group")
                .increment(1);
            CloudifyError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>> {
        let rows = sqlx::query("SELECT * FROM resource_groups ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(row_to_group).collect()
    }

    #[instrument(skip(self), fields(group_id = %group_id))]
    async fn get_resource_group(&self, group_id: Uuid) -> Result<Option<ResourceGroup>> {
        let row = sqlx::query("SELECT * FROM resource_groups WHERE id = ?")
            .bind(group_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        row.map(row_to_group).transpose()
    }

    #[instrument(skip(self, environment), fields(environment_id = %environment.id))]
    async fn add_environment(&self, environment: &Environment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO environments (id, resource_group_id, name, network_mode, base_domain, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(environment.id.to_string())
        .bind(environment.resource_group_id.to_string())
        .bind(environment.name.as_str())
        .bind(environment.network_mode.as_str())
        .bind(&environment.base_domain)
        .bind(environment.created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("cloudify_db_errors_total", "operation" => "add_environment")
                .increment(1);
            CloudifyError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(environment_id = %environment_id))]
    async fn get_environment(&self, environment_id: Uuid) -> Result<Option<Environment>> {
        let row = sqlx::query("SELECT * FROM environments WHERE id = ?")
            .bind(environment_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        row.map(row_to_environment).transpose()
    }

    #[instrument(skip(self), fields(group_id = %group_id))]
    async fn list_environments(&self, group_id: Uuid) -> Result<Vec<Environment>> {
        let rows = sqlx::query(
            "SELECT * FROM environments WHERE resource_group_id = ? ORDER BY created_at",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(row_to_environment).collect()
    }

    #[instrument(skip(self, resource), fields(resource_id = %resource.id))]
    async fn add_resource(&self, resource: &Resource) -> Result<()> {
        let (capacity_json, policy_json, spec_json) = serialize_resource(resource)?;

        sqlx::query(
            r#"
            INSERT INTO resources (id, environment_id, name, kind, state, created_at, capacity, port_policy, spec)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(resource.id.to_string())
        .bind(resource.environment_id.to_string())
        .bind(&resource.name)
        .bind(resource.kind().as_str())
        .bind(resource.state.as_str())
        .bind(resource.created_at.timestamp())
        .bind(capacity_json)
        .bind(policy_json)
        .bind(spec_json)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("cloudify_db_errors_total", "operation" => "add_resource")
                .increment(1);
            CloudifyError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(resource_id = %resource_id))]
    async fn get_resource(&self, resource_id: Uuid) -> Result<Option<Resource>> {
        let row = sqlx::query("SELECT * FROM resources WHERE id = ?")
            .bind(resource_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        row.map(row_to_resource).transpose()
    }

    #[instrument(skip(self), fields(environment_id = %environment_id))]
    async fn list_resources(&self, environment_id: Uuid) -> Result<Vec<Resource>> {
        let rows =
            sqlx::query("SELECT * FROM resources WHERE environment_id = ? ORDER BY created_at")
                .bind(environment_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(row_to_resource).collect()
    }

    #[instrument(skip(self, resource), fields(resource_id = %resource.id))]
    async fn update_resource(&self, resource: &Resource) -> Result<()> {
        let (capacity_json, policy_json, spec_json) = serialize_resource(resource)?;

        sqlx::query(
            r#"
            UPDATE resources
            SET name = ?, state = ?, capacity = ?, port_policy = ?, spec = ?
            WHERE id = ?
            "#,
        )
        .bind(&resource.name)
        .bind(resource.state.as_str())
        .bind(capacity_json)
        .bind(policy_json)
        .bind(spec_json)
        .bind(resource.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self), fields(resource_id = %resource_id))]
    async fn remove_resource(&self, resource_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM resources WHERE id = ?")
            .bind(resource_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                metrics::counter!("cloudify_db_errors_total", "operation" => "remove_resource")
                    .increment(1);
                CloudifyError::DatabaseError(e.to_string())
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(environment_id = %environment_id, port = port))]
    async fn assign_port(
        &self,
        environment_id: Uuid,
        resource_id: Uuid,
        port: u16,
    ) -> Result<bool> {
        // The UNIQUE(environment_id, port) constraint is the conflict
        // detector; a lost race surfaces as zero affected rows.
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO port_allocations (environment_id, resource_id, port)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(environment_id.to_string())
        .bind(resource_id.to_string())
        .bind(i64::from(port))
        .execute(&self.pool)
        .await
        .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(environment_id = %environment_id))]
    async fn list_allocated_ports(&self, environment_id: Uuid) -> Result<Vec<u16>> {
        let rows = sqlx::query(
            "SELECT port FROM port_allocations WHERE environment_id = ? ORDER BY port",
        )
        .bind(environment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.get::<i64, _>("port") as u16).collect())
    }

    #[instrument(skip(self), fields(environment_id = %environment_id, resource_id = %resource_id))]
    async fn list_resource_ports(
        &self,
        environment_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<u16>> {
        let rows = sqlx::query(
            r#"
            SELECT port FROM port_allocations
            WHERE environment_id = ? AND resource_id = ?
            ORDER BY port
            "#,
        )
        .bind(environment_id.to_string())
        .bind(resource_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.get::<i64, _>("port") as u16).collect())
    }

    #[instrument(skip(self), fields(environment_id = %environment_id, resource_id = %resource_id))]
    async fn remove_ports(&self, environment_id: Uuid, resource_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM port_allocations WHERE environment_id = ? AND resource_id = ?")
            .bind(environment_id.to_string())
            .bind(resource_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| CloudifyError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

fn serialize_resource(resource: &Resource) -> Result<(Option<String>, Option<String>, String)> {
    let capacity_json = resource
        .capacity
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| CloudifyError::DatabaseError(format!("Failed to serialize capacity: {}", e)))?;

    let policy_json = resource
        .port_policy
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| {
            CloudifyError::DatabaseError(format!("Failed to serialize port policy: {}", e))
        })?;

    let spec_json = serde_json::to_string(&resource.spec)
        .map_err(|e| CloudifyError::DatabaseError(format!("Failed to serialize spec: {}", e)))?;

    Ok((capacity_json, policy_json, spec_json))
}

fn parse_uuid(value: String) -> Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| CloudifyError::DatabaseError(format!("Invalid identifier: {}", e)))
}

fn parse_timestamp(secs: i64) -> Result<chrono::DateTime<chrono::Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CloudifyError::DatabaseError(format!("Invalid timestamp: {}", secs)))
}

fn row_to_group(row: SqliteRow) -> Result<ResourceGroup> {
    let tags_json: String = row.get("tags");
    let tags: BTreeMap<String, String> = serde_json::from_str(&tags_json)
        .map_err(|e| CloudifyError::DatabaseError(format!("Failed to deserialize tags: {}", e)))?;

    ResourceGroup::new(
        parse_uuid(row.get("id"))?,
        row.get::<String, _>("name"),
        parse_timestamp(row.get("created_at"))?,
        tags,
    )
}

fn row_to_environment(row: SqliteRow) -> Result<Environment> {
    let name_str: String = row.get("name");
    let name = EnvironmentName::parse(&name_str)
        .ok_or_else(|| CloudifyError::DatabaseError(format!("Unknown environment name: {}", name_str)))?;

    let mode_str: String = row.get("network_mode");
    let network_mode = NetworkMode::parse(&mode_str)
        .ok_or_else(|| CloudifyError::DatabaseError(format!("Unknown network mode: {}", mode_str)))?;

    Environment::new(
        parse_uuid(row.get("id"))?,
        parse_uuid(row.get("resource_group_id"))?,
        name,
        network_mode,
        row.get("base_domain"),
        parse_timestamp(row.get("created_at"))?,
    )
}

fn row_to_resource(row: SqliteRow) -> Result<Resource> {
    let capacity = row
        .get::<Option<String>, _>("capacity")
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| {
            CloudifyError::DatabaseError(format!("Failed to deserialize capacity: {}", e))
        })?;

    let port_policy = row
        .get::<Option<String>, _>("port_policy")
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| {
            CloudifyError::DatabaseError(format!("Failed to deserialize port policy: {}", e))
        })?;

    let spec_json: String = row.get("spec");
    let spec = serde_json::from_str(&spec_json)
        .map_err(|e| CloudifyError::DatabaseError(format!("Failed to deserialize spec: {}", e)))?;

    let state_str: String = row.get("state");
    let state = crate::types::ResourceState::parse(&state_str)
        .ok_or_else(|| CloudifyError::DatabaseError(format!("Unknown resource state: {}", state_str)))?;

    Resource::new(
        parse_uuid(row.get("id"))?,
        parse_uuid(row.get("environment_id"))?,
        row.get::<String, _>("name"),
        state,
        parse_timestamp(row.get("created_at"))?,
        capacity,
        port_policy,
        spec,
    )
}
