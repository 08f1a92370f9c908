use crate::compose::{naming, ManifestRenderer};
use crate::state::{MemoryStateStore, StateStore};
use crate::types::{
    CredentialProfile, PortPolicy, Resource, ResourceSpec, ResourceState, StorageProfile,
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

fn resource(environment_id: Uuid, id: Uuid, name: &str, spec: ResourceSpec) -> Resource {
    Resource::new(
        id,
        environment_id,
        name,
        ResourceState::Provisioning,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        None,
        None,
        spec,
    )
    .unwrap()
}

fn postgres(environment_id: Uuid, id: Uuid) -> Resource {
    resource(
        environment_id,
        id,
        "orders-db",
        ResourceSpec::Postgres {
            storage: StorageProfile::new("pg-data", 20, "/var/lib/postgresql/data", true).unwrap(),
            credentials: CredentialProfile::new("admin", "secret").unwrap(),
        },
    )
}

fn redis(environment_id: Uuid, id: Uuid, name: &str) -> Resource {
    resource(
        environment_id,
        id,
        name,
        ResourceSpec::Redis {
            storage: StorageProfile::new("cache-data", 1, "/data", true).unwrap(),
        },
    )
}

async fn store_with(resources: Vec<(Resource, Vec<u16>)>) -> Arc<MemoryStateStore> {
    let store = Arc::new(MemoryStateStore::new());
    for (resource, ports) in resources {
        store.add_resource(&resource).await.unwrap();
        for port in ports {
            assert!(store.assign_port(resource.environment_id, resource.id, port).await.unwrap());
        }
    }
    store
}

#[tokio::test]
async fn test_rendering_is_deterministic() {
    let env = Uuid::from_u128(7);
    let store = store_with(vec![
        (postgres(env, Uuid::from_u128(0xaaaaaaaa_0000_0000_0000_000000000001)), vec![5432]),
        (redis(env, Uuid::from_u128(0xbbbbbbbb_0000_0000_0000_000000000002), "cache"), vec![6379]),
    ])
    .await;
    let renderer = ManifestRenderer::new(store);

    let first = renderer.render(env).await.unwrap();
    let second = renderer.render(env).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_services_sorted_by_name_not_insertion_order() {
    let env = Uuid::from_u128(7);
    // Insert the lexicographically-later service first.
    let late = redis(env, Uuid::from_u128(0xffffff00_0000_0000_0000_000000000001), "z-cache");
    let early = redis(env, Uuid::from_u128(0x00000100_0000_0000_0000_000000000002), "a-cache");
    let store = store_with(vec![(late.clone(), vec![]), (early.clone(), vec![])]).await;
    let renderer = ManifestRenderer::new(store);

    let yaml = renderer.render(env).await.unwrap();
    let early_pos = yaml.find(&naming::service_name(&early)).unwrap();
    let late_pos = yaml.find(&naming::service_name(&late)).unwrap();
    assert!(early_pos < late_pos, "services must be ordered by derived name");
}

#[tokio::test]
async fn test_postgres_service_shape() {
    let env = Uuid::from_u128(9);
    let id = Uuid::from_u128(0xabcdef00_0000_0000_0000_000000000003);
    let store = store_with(vec![(postgres(env, id), vec![5432])]).await;
    let renderer = ManifestRenderer::new(store);

    let yaml = renderer.render(env).await.unwrap();

    assert!(yaml.starts_with("version: \"3.9\"\nservices:\n"));
    assert!(yaml.contains("  postgres-abcdef:\n"));
    assert!(yaml.contains("    image: \"postgres:16.4\"\n"));
    assert!(yaml.contains("      - \"localhost:5432:5432\"\n"));
    // Environment variables sorted by key.
    let password_pos = yaml.find("POSTGRES_PASSWORD: 'secret'").unwrap();
    let user_pos = yaml.find("POSTGRES_USER: 'admin'").unwrap();
    assert!(password_pos < user_pos);
    // Healthcheck probes the configured user.
    assert!(yaml.contains("        - 'pg_isready -U admin'\n"));
    assert!(yaml.contains("      interval: \"10s\"\n"));
    assert!(yaml.contains("      timeout: \"5s\"\n"));
    assert!(yaml.contains("      retries: 5\n"));
    // One persistent volume, registered at top level with a name field.
    let volume = naming::volume_name(env, id);
    assert!(yaml.contains(&format!("      - \"{}:/var/lib/postgresql/data\"\n", volume)));
    assert!(yaml.contains(&format!("volumes:\n  {}:\n    name: \"{}\"\n", volume, volume)));
}

#[tokio::test]
async fn test_declared_ports_zipped_and_truncated() {
    let env = Uuid::from_u128(11);
    let id = Uuid::from_u128(0x12345600_0000_0000_0000_000000000004);
    let mut app = resource(
        env,
        id,
        "web",
        ResourceSpec::AppService { image: "ghcr.io/acme/web:1.2".into(), health_endpoint: None },
    );
    app.set_port_policy(Some(PortPolicy::new([9090, 8080]).unwrap()));

    // Only one host port allocated for two declared container ports.
    let store = store_with(vec![(app, vec![18080])]).await;
    let renderer = ManifestRenderer::new(store);

    let yaml = renderer.render(env).await.unwrap();
    // Declared ports sorted ascending, zip truncates to the shorter list.
    assert!(yaml.contains("      - \"localhost:18080:8080\"\n"));
    assert!(!yaml.contains(":9090\""));
    assert!(yaml.contains("    image: \"ghcr.io/acme/web:1.2\"\n"));
    // No healthcheck or volumes for app services.
    assert!(!yaml.contains("healthcheck"));
}

#[tokio::test]
async fn test_scalars_with_quotes_are_escaped() {
    let env = Uuid::from_u128(13);
    let id = Uuid::from_u128(0x99999900_0000_0000_0000_000000000005);
    let quoted = resource(
        env,
        id,
        "quoted-db",
        ResourceSpec::Postgres {
            storage: StorageProfile::new("pg-data", 1, "/var/lib/postgresql/data", true).unwrap(),
            credentials: CredentialProfile::new("admin", "it's secret").unwrap(),
        },
    );
    let store = store_with(vec![(quoted, vec![])]).await;
    let renderer = ManifestRenderer::new(store);

    let yaml = renderer.render(env).await.unwrap();
    assert!(yaml.contains("POSTGRES_PASSWORD: 'it''s secret'"));
}

#[tokio::test]
async fn test_empty_environment_renders_header_only() {
    let store = Arc::new(MemoryStateStore::new());
    let renderer = ManifestRenderer::new(store);

    let yaml = renderer.render(Uuid::from_u128(17)).await.unwrap();
    assert_eq!(yaml, "version: \"3.9\"\nservices:\n");
}
