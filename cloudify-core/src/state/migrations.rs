//! Database migrations.

use crate::error::{CloudifyError, Result};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 1;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    // Resource groups table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resource_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            tags TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    // Environments table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS environments (
            id TEXT PRIMARY KEY,
            resource_group_id TEXT NOT NULL REFERENCES resource_groups(id),
            name TEXT NOT NULL,
            network_mode TEXT NOT NULL DEFAULT 'bridge',
            base_domain TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_environments_group ON environments(resource_group_id)",
    )
    .execute(pool)
    .await
    .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    // Resources table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            environment_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            state TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            capacity TEXT,
            port_policy TEXT,
            spec TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_env ON resources(environment_id)")
        .execute(pool)
        .await
        .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    // Port allocations table. The primary key doubles as the unique
    // constraint backing atomic assignment.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS port_allocations (
            environment_id TEXT NOT NULL,
            resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
            port INTEGER NOT NULL,
            PRIMARY KEY (environment_id, port)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_port_allocations_resource ON port_allocations(resource_id)",
    )
    .execute(pool)
    .await
    .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    // Update schema version
    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await
        .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(1i64)
        .execute(pool)
        .await
        .map_err(|e| CloudifyError::MigrationFailed { reason: e.to_string() })?;

    info!("Migration to schema version 1 complete");
    Ok(())
}
