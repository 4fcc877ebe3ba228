//! Integration tests for pushing local changes

use super::test_utils::*;
use apigit::hash::blob_hash;
use apigit::sync::push::{commit_key, parse_commit_key};
use apigit::{AdapterMeta, Change, EntryState, PushInput, RemoteAdapter, Replica, SyncError};
use std::sync::Arc;

async fn replica_with(remote: &Arc<ScriptedRemote>, three_step: bool) -> Replica {
    let adapter = if three_step {
        RemoteAdapter::with_three_step(remote.clone())
    } else {
        RemoteAdapter::with_actions(remote.clone())
    };
    let mut replica = memory_replica().await.with_adapter(adapter);
    replica
        .set_adapter_meta(AdapterMeta::github("acme", "widgets", "main"))
        .await
        .unwrap();
    replica
}

fn create(path: &str, content: &str) -> Change {
    Change::Create {
        path: path.to_string(),
        content: content.as_bytes().to_vec(),
    }
}

#[tokio::test]
async fn test_push_explicit_create() {
    let remote = ScriptedRemote::new("main");
    let mut replica = replica_with(&remote, false).await;

    let outcome = replica
        .push(PushInput::new("Add x").with_changes(vec![create("x.txt", "hi")]))
        .await
        .unwrap();

    assert_eq!(outcome.commit_sha, "c1");
    assert_eq!(replica.head().await.unwrap(), "c1");
    assert_eq!(
        read_string(replica.read_file("x.txt").await.unwrap()).as_deref(),
        Some("hi")
    );
    assert!(replica.pending_changes().await.unwrap().is_empty());

    let index = replica.index().await.unwrap();
    assert_eq!(index.last_commit_key.as_deref(), Some(outcome.commit_key.as_str()));
    assert_eq!(index.entries["x.txt"].base_sha, Some(blob_hash(b"hi")));
    assert_eq!(
        remote.calls(),
        vec!["create_commit_with_actions", "update_ref"]
    );
    assert_eq!(remote.head("main").as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_push_pending_edits() {
    let remote = ScriptedRemote::new("main");
    remote.seed("main", "h1", &[("a.txt", "v1"), ("b.txt", "v1")]);
    let mut replica = replica_with(&remote, false).await;
    replica.pull_remote(None).await.unwrap();

    replica.write_file("a.txt", b"v2").await.unwrap();
    replica.delete_file("b.txt").await.unwrap();
    replica.write_file("c.txt", b"new").await.unwrap();

    let pending = replica.pending_changes().await.unwrap();
    let ops: Vec<(&str, &str)> = pending.iter().map(|c| (c.op(), c.path())).collect();
    assert_eq!(
        ops,
        vec![("update", "a.txt"), ("delete", "b.txt"), ("create", "c.txt")]
    );

    let outcome = replica.push(PushInput::new("Edit")).await.unwrap();

    assert_eq!(outcome.applied.len(), 3);
    assert!(replica.pending_changes().await.unwrap().is_empty());
    let index = replica.index().await.unwrap();
    assert_eq!(index.head, outcome.commit_sha);
    assert_eq!(index.entries["a.txt"].state, EntryState::Base);
    assert!(index.get("b.txt").is_none());
    assert_eq!(index.entries["c.txt"].state, EntryState::Base);

    let remote_files = remote.files(&outcome.commit_sha).unwrap();
    assert_eq!(remote_files, files_of(&[("a.txt", "v2"), ("c.txt", "new")]));

    // Next pull of the pushed commit is a no-op
    let pulled = replica.pull_remote(None).await.unwrap();
    assert!(pulled.conflicts.is_empty());
    assert!(pulled.updated.is_empty());
}

#[tokio::test]
async fn test_push_three_step_flow() {
    let remote = ScriptedRemote::new("main");
    remote.seed("main", "h1", &[("a.txt", "v1"), ("b.txt", "v1")]);
    let mut replica = replica_with(&remote, true).await;
    replica.pull_remote(None).await.unwrap();

    replica.write_file("a.txt", b"v2").await.unwrap();
    replica.delete_file("b.txt").await.unwrap();
    let outcome = replica.push(PushInput::new("Three step")).await.unwrap();

    assert_eq!(
        remote.calls(),
        vec![
            "resolve_ref",
            "fetch_snapshot",
            "create_blobs",
            "create_tree",
            "create_commit",
            "update_ref"
        ]
    );
    assert_eq!(
        remote.files(&outcome.commit_sha).unwrap(),
        files_of(&[("a.txt", "v2")])
    );
    assert_eq!(replica.head().await.unwrap(), outcome.commit_sha);
}

#[tokio::test]
async fn test_push_with_stale_parent_is_rejected() {
    let remote = ScriptedRemote::new("main");
    let mut replica = replica_with(&remote, false).await;
    replica.write_file("a.txt", b"x").await.unwrap();

    let result = replica
        .push(PushInput::new("Stale").with_parent("not-the-head"))
        .await;

    assert!(matches!(result, Err(SyncError::Concurrency { .. })));
    assert!(remote.calls().is_empty());
    assert_eq!(replica.pending_changes().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_push_without_changes_is_rejected() {
    let remote = ScriptedRemote::new("main");
    let mut replica = replica_with(&remote, false).await;

    assert!(matches!(
        replica.push(PushInput::new("Nothing")).await,
        Err(SyncError::NoChanges)
    ));
    assert!(matches!(
        replica
            .push(PushInput::new("Nothing").with_changes(Vec::new()))
            .await,
        Err(SyncError::NoChanges)
    ));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_push_requires_branch() {
    let remote = ScriptedRemote::new("main");
    let mut replica = memory_replica()
        .await
        .with_adapter(RemoteAdapter::with_actions(remote.clone()));
    replica.write_file("a.txt", b"x").await.unwrap();

    assert!(matches!(
        replica.push(PushInput::new("No branch")).await,
        Err(SyncError::NoBranch)
    ));

    let outcome = replica
        .push(PushInput::new("Explicit").with_branch("main"))
        .await
        .unwrap();
    assert_eq!(remote.head("main"), Some(outcome.commit_sha));
}

#[tokio::test]
async fn test_rejected_ref_update_leaves_replica_untouched() {
    let remote = ScriptedRemote::new("main");
    remote.fail_update_ref(422, "Update is not a fast forward");
    let mut replica = replica_with(&remote, false).await;
    replica.write_file("a.txt", b"x").await.unwrap();

    let result = replica.push(PushInput::new("Race")).await;

    match result {
        Err(SyncError::NonFastForward { commit_sha }) => assert_eq!(commit_sha, "c1"),
        other => panic!("expected non-fast-forward, got {:?}", other),
    }
    let index = replica.index().await.unwrap();
    assert_eq!(index.head, "");
    assert!(index.last_commit_key.is_none());
    assert_eq!(index.entries["a.txt"].state, EntryState::Added);
}

#[tokio::test]
async fn test_other_ref_update_failure_is_swallowed() {
    let remote = ScriptedRemote::new("main");
    remote.fail_update_ref(500, "internal error");
    let mut replica = replica_with(&remote, false).await;
    replica.write_file("a.txt", b"x").await.unwrap();

    let outcome = replica.push(PushInput::new("Flaky ref")).await.unwrap();

    assert_eq!(replica.head().await.unwrap(), outcome.commit_sha);
    assert!(replica.pending_changes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_failure_leaves_replica_untouched() {
    let remote = ScriptedRemote::new("main");
    remote.fail_commits(500, "boom");
    let mut replica = replica_with(&remote, true).await;
    replica.write_file("a.txt", b"x").await.unwrap();
    let before = replica.index().await.unwrap();

    let result = replica.push(PushInput::new("Fails")).await;

    assert!(matches!(result, Err(SyncError::Adapter(_))));
    assert_eq!(replica.index().await.unwrap(), before);
    assert!(!remote.calls().contains(&"update_ref".to_string()));
}

#[tokio::test]
async fn test_commit_key_embedded_and_idempotent() {
    let remote = ScriptedRemote::new("main");
    let mut replica = replica_with(&remote, false).await;
    replica.write_file("a.txt", b"x").await.unwrap();

    let pending = replica.pending_changes().await.unwrap();
    let expected = commit_key("", &pending).unwrap();
    assert_eq!(commit_key("", &pending).unwrap(), expected);

    let outcome = replica.push(PushInput::new("Keyed")).await.unwrap();

    assert_eq!(outcome.commit_key, expected);
    let messages = remote.messages();
    assert!(messages[0].starts_with("Keyed\n\n"));
    assert_eq!(parse_commit_key(&messages[0]), Some(expected.as_str()));
}

#[tokio::test]
async fn test_supplied_commit_key_is_used() {
    let remote = ScriptedRemote::new("main");
    let mut replica = replica_with(&remote, false).await;

    let outcome = replica
        .push(
            PushInput::new("Keyed")
                .with_changes(vec![create("a.txt", "x")])
                .with_commit_key("retry-key"),
        )
        .await
        .unwrap();

    assert_eq!(outcome.commit_key, "retry-key");
    assert!(remote.messages()[0].ends_with("apigit-commit-key:retry-key"));
}

#[tokio::test]
async fn test_conflicted_paths_are_not_pushed() {
    let remote = ScriptedRemote::new("main");
    remote.seed("main", "h1", &[("a.txt", "v1")]);
    let mut replica = replica_with(&remote, false).await;
    replica.pull_remote(None).await.unwrap();
    replica.write_file("a.txt", b"local").await.unwrap();
    replica.write_file("b.txt", b"new").await.unwrap();

    remote.seed("main", "h2", &[("a.txt", "v2")]);
    let outcome = replica.pull_remote(None).await.unwrap();
    assert_eq!(outcome.conflicts.len(), 1);

    let pending = replica.pending_changes().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].path(), "b.txt");
}
