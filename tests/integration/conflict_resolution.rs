//! Integration tests for conflict inspection and resolution

use super::test_utils::*;
use apigit::hash::blob_hash;
use apigit::{EntryState, Replica};

/// Replica at h1 with a.txt edited locally and changed remotely at h2
async fn conflicted_replica() -> Replica {
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;
    replica.write_file("a.txt", b"local").await.unwrap();
    let outcome = replica.pull(&snapshot("h2", &[("a.txt", "v2")])).await.unwrap();
    assert_eq!(outcome.conflicts.len(), 1);
    replica
}

#[tokio::test]
async fn test_list_and_read_conflicts() {
    let replica = conflicted_replica().await;

    let conflicts = replica.conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, "a.txt");
    assert_eq!(
        read_string(replica.read_conflict("a.txt").await.unwrap()).as_deref(),
        Some("v2")
    );
}

#[tokio::test]
async fn test_resolve_with_remote_then_pull_advances() {
    let mut replica = conflicted_replica().await;

    assert!(replica.resolve_conflict("a.txt", None).await.unwrap());
    assert!(replica.conflicts().await.unwrap().is_empty());
    assert_eq!(
        read_string(replica.read_file("a.txt").await.unwrap()).as_deref(),
        Some("v2")
    );

    // Head only moves with a pull that sees no conflicts
    assert_eq!(replica.head().await.unwrap(), "h1");
    let outcome = replica.pull(&snapshot("h2", &[("a.txt", "v2")])).await.unwrap();
    assert!(outcome.conflicts.is_empty());
    assert_eq!(replica.head().await.unwrap(), "h2");
}

#[tokio::test]
async fn test_resolve_with_merge_result_is_pending() {
    let mut replica = conflicted_replica().await;

    assert!(replica
        .resolve_conflict("a.txt", Some(b"merged"))
        .await
        .unwrap());

    let pending = replica.pending_changes().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].op(), "update");
    assert_eq!(pending[0].base_sha(), Some(&blob_hash(b"v2")));
    assert_eq!(pending[0].content(), Some(&b"merged"[..]));
}

#[tokio::test]
async fn test_resolve_unconflicted_path_returns_false() {
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;
    assert!(!replica.resolve_conflict("a.txt", None).await.unwrap());
    assert!(!replica.resolve_conflict("missing.txt", None).await.unwrap());
}

#[tokio::test]
async fn test_resolve_remote_deletion() {
    // Accepting the deletion forgets the path
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;
    replica.write_file("a.txt", b"local").await.unwrap();
    replica.pull(&snapshot("h2", &[])).await.unwrap();
    assert!(replica.resolve_conflict("a.txt", None).await.unwrap());
    assert!(replica.index().await.unwrap().get("a.txt").is_none());
    assert!(replica.read_file("a.txt").await.unwrap().is_none());

    // Keeping local content re-adds the file
    let mut replica = synced_replica("h1", &[("a.txt", "v1")]).await;
    replica.write_file("a.txt", b"local").await.unwrap();
    replica.pull(&snapshot("h2", &[])).await.unwrap();
    assert!(replica
        .resolve_conflict("a.txt", Some(b"local"))
        .await
        .unwrap());
    let entry = &replica.index().await.unwrap().entries["a.txt"];
    assert_eq!(entry.state, EntryState::Added);
    assert!(entry.base_sha.is_none());
    assert_eq!(replica.pending_changes().await.unwrap()[0].op(), "create");
}

#[tokio::test]
async fn test_metadata_only_resolution() {
    let mut replica = memory_replica().await;
    replica
        .pull(&unfetchable_snapshot("h1", &[("a.txt", "v1")]))
        .await
        .unwrap();

    assert!(replica.resolve_conflict("a.txt", None).await.unwrap());
    let entry = &replica.index().await.unwrap().entries["a.txt"];
    assert_eq!(entry.state, EntryState::Base);
    assert_eq!(entry.base_sha, Some(blob_hash(b"v1")));
    assert!(entry.remote_sha.is_none());
}

#[tokio::test]
async fn test_resolve_all_refuses_divergent_batch() {
    let mut replica = conflicted_replica().await;
    let conflicts = replica.conflicts().await.unwrap();

    assert!(!replica
        .resolve_all(&conflicts, &"h2".to_string())
        .await
        .unwrap());
    assert_eq!(replica.head().await.unwrap(), "h1");
    assert_eq!(replica.conflicts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resolve_all_after_individual_resolution() {
    let mut replica = conflicted_replica().await;
    let conflicts = replica.conflicts().await.unwrap();
    replica.resolve_conflict("a.txt", None).await.unwrap();

    assert!(replica
        .resolve_all(&conflicts, &"h2".to_string())
        .await
        .unwrap());
    assert_eq!(replica.head().await.unwrap(), "h2");
}

#[tokio::test]
async fn test_resolve_all_convergent_conflicts() {
    let mut replica = conflicted_replica().await;
    let conflicts = replica.conflicts().await.unwrap();

    // Another writer brought the base in line with the remote
    let mut index = replica.index().await.unwrap();
    let entry = index.entries.get_mut("a.txt").unwrap();
    entry.base_sha = entry.remote_sha.clone();
    replica.storage().write_index(&index).await.unwrap();
    let mut replica = Replica::open(replica.storage().clone()).await.unwrap();

    assert!(replica
        .resolve_all(&conflicts, &"h2".to_string())
        .await
        .unwrap());
    assert_eq!(replica.head().await.unwrap(), "h2");
    let entry = &replica.index().await.unwrap().entries["a.txt"];
    assert_ne!(entry.state, EntryState::Conflict);
    assert_eq!(entry.base_sha, Some(blob_hash(b"v2")));
}
