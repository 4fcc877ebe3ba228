//! Integration tests for replicas over the bundled storage backends

use super::test_utils::*;
use apigit::config::{open_storage, BackendKind, ConfigLoader, StorageConfig};
use apigit::storage::{MemoryRegistry, SledStorage, StorageBackend};
use apigit::{EntryState, Replica};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_sled_replica_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("replica");

    {
        let storage = Arc::new(SledStorage::new(&db_path).unwrap());
        let mut replica = Replica::open(storage.clone()).await.unwrap();
        replica.pull(&snapshot("h1", &[("a.txt", "v1")])).await.unwrap();
        replica.write_file("a.txt", b"edit").await.unwrap();
        storage.flush().unwrap();
    }

    let storage = Arc::new(SledStorage::new(&db_path).unwrap());
    let replica = Replica::open(storage).await.unwrap();
    assert_eq!(replica.head().await.unwrap(), "h1");
    assert_eq!(
        read_string(replica.read_file("a.txt").await.unwrap()).as_deref(),
        Some("edit")
    );
    let entry = &replica.index().await.unwrap().entries["a.txt"];
    assert_eq!(entry.state, EntryState::Modified);
}

#[tokio::test]
async fn test_corrupt_index_resets_to_empty() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(SledStorage::new(temp_dir.path()).unwrap());
    storage
        .db()
        .insert(b"apigit:index", b"definitely not an index".to_vec())
        .unwrap();
    assert!(storage.read_index().await.is_err());

    let replica = Replica::open(storage.clone()).await.unwrap();

    assert_eq!(replica.head().await.unwrap(), "");
    assert!(replica.index().await.unwrap().entries.is_empty());
    // The fresh index was persisted in place of the corrupt one
    assert!(storage.read_index().await.unwrap().is_some());
}

#[tokio::test]
async fn test_memory_roots_are_shared_through_registry() {
    let registry = MemoryRegistry::new();
    let config = StorageConfig {
        root_name: "shared".to_string(),
        ..StorageConfig::default()
    };

    let mut writer = Replica::open(open_storage(&config, &registry).unwrap())
        .await
        .unwrap();
    writer.write_file("a.txt", b"hello").await.unwrap();

    let reader = Replica::open(open_storage(&config, &registry).unwrap())
        .await
        .unwrap();
    assert_eq!(
        read_string(reader.read_file("a.txt").await.unwrap()).as_deref(),
        Some("hello")
    );

    // Another registry shares nothing
    let isolated = Replica::open(open_storage(&config, &MemoryRegistry::new()).unwrap())
        .await
        .unwrap();
    assert!(isolated.read_file("a.txt").await.unwrap().is_none());
    assert_eq!(registry.root_names(), vec!["shared".to_string()]);
}

#[tokio::test]
async fn test_replica_from_workspace_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join(".apigit");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[storage]\nbackend = \"sled\"\npath = \"state\"\n",
    )
    .unwrap();

    let config = ConfigLoader::load_with_global(temp_dir.path(), None).unwrap();
    assert_eq!(config.storage.backend, BackendKind::Sled);

    let storage: Arc<dyn StorageBackend> =
        open_storage(&config.storage, &MemoryRegistry::new()).unwrap();
    let mut replica = Replica::open(storage).await.unwrap();
    replica.write_file("a.txt", b"x").await.unwrap();
    assert!(temp_dir.path().join("state").exists());
}
