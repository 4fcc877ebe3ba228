//! Integration tests for local file operations

use super::test_utils::*;
use apigit::{EntryState, SyncError};

#[tokio::test]
async fn test_write_read_round_trip() {
    let mut replica = memory_replica().await;

    replica.write_file("notes/today.md", b"# Today").await.unwrap();

    assert_eq!(
        read_string(replica.read_file("notes/today.md").await.unwrap()).as_deref(),
        Some("# Today")
    );
    // Leading slash addresses the same path
    assert_eq!(
        read_string(replica.read_file("/notes/today.md").await.unwrap()).as_deref(),
        Some("# Today")
    );
}

#[tokio::test]
async fn test_write_then_delete_reads_absent() {
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;

    assert!(replica.delete_file("a.txt").await.unwrap());

    assert!(replica.read_file("a.txt").await.unwrap().is_none());
    assert!(replica.list_files(None, true).await.unwrap().is_empty());
    let entry = &replica.index().await.unwrap().entries["a.txt"];
    assert_eq!(entry.state, EntryState::Deleted);

    // Deleting again is a no-op
    assert!(!replica.delete_file("a.txt").await.unwrap());

    // Writing again revives the path as an edit over the kept base
    replica.write_file("a.txt", b"v2").await.unwrap();
    let entry = &replica.index().await.unwrap().entries["a.txt"];
    assert_eq!(entry.state, EntryState::Modified);
}

#[tokio::test]
async fn test_restoring_base_content_reverts_edit() {
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;

    replica.write_file("a.txt", b"edit").await.unwrap();
    assert_eq!(replica.pending_changes().await.unwrap().len(), 1);

    let entry = replica.write_file("a.txt", b"v1").await.unwrap();
    assert_eq!(entry.state, EntryState::Base);
    assert!(replica.pending_changes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rename_moves_content() {
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;

    replica.rename_file("a.txt", "docs/b.txt").await.unwrap();

    assert_eq!(
        read_string(replica.read_file("docs/b.txt").await.unwrap()).as_deref(),
        Some("v1")
    );
    assert!(replica.read_file("a.txt").await.unwrap().is_none());
    assert_eq!(
        replica.list_files(None, true).await.unwrap(),
        vec!["docs/b.txt".to_string()]
    );

    let ops: Vec<String> = replica
        .pending_changes()
        .await
        .unwrap()
        .iter()
        .map(|c| format!("{} {}", c.op(), c.path()))
        .collect();
    assert_eq!(ops, vec!["delete a.txt", "create docs/b.txt"]);
}

#[tokio::test]
async fn test_rename_missing_source() {
    let mut replica = memory_replica().await;
    assert!(matches!(
        replica.rename_file("nope.txt", "b.txt").await,
        Err(SyncError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_conflicted_path_is_refused() {
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;
    replica.write_file("a.txt", b"local").await.unwrap();
    replica.pull(&snapshot("h2", &[("a.txt", "v2")])).await.unwrap();

    assert!(matches!(
        replica.delete_file("a.txt").await,
        Err(SyncError::Conflicted(path)) if path == "a.txt"
    ));
}

#[tokio::test]
async fn test_invalid_paths_rejected() {
    let mut replica = memory_replica().await;
    assert!(matches!(
        replica.write_file("", b"x").await,
        Err(SyncError::InvalidInput(_))
    ));
    assert!(matches!(
        replica.write_file("../escape.txt", b"x").await,
        Err(SyncError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_list_files_by_prefix() {
    let mut replica = memory_replica().await;
    for path in ["src/lib.rs", "src/sync/pull.rs", "README.md"] {
        replica.write_file(path, b"x").await.unwrap();
    }

    assert_eq!(
        replica.list_files(Some("src"), false).await.unwrap(),
        vec!["src/lib.rs".to_string()]
    );
    assert_eq!(
        replica.list_files(Some("src"), true).await.unwrap(),
        vec!["src/lib.rs".to_string(), "src/sync/pull.rs".to_string()]
    );
    assert_eq!(replica.list_files(None, false).await.unwrap().len(), 1);
}
