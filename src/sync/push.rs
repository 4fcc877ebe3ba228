//! Push coordinator
//!
//! Local state is mutated only after the remote commit exists. Any failure before that point
//! leaves the replica exactly as it was.

use crate::content::SegmentedStore;
use crate::error::{AdapterError, StorageError, SyncError};
use crate::hash::{blob_hash, compute_hash, content_hash};
use crate::index::EntryState;
use crate::remote::{CommitFlow, RemoteAdapter, TreeChange};
use crate::storage::BlobSegment;
use crate::sync::Change;
use crate::types::Hash;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Marker preceding the idempotency key in remote commit messages
pub const COMMIT_KEY_MARKER: &str = "apigit-commit-key:";

/// Parameters of one push; every field falls back to replica state when unset
#[derive(Debug, Clone, Default)]
pub struct PushInput {
    pub message: String,
    pub parent_sha: Option<Hash>,
    pub changes: Option<Vec<Change>>,
    pub commit_key: Option<Hash>,
    pub branch: Option<String>,
}

impl PushInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent_sha: impl Into<Hash>) -> Self {
        self.parent_sha = Some(parent_sha.into());
        self
    }

    pub fn with_changes(mut self, changes: Vec<Change>) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_commit_key(mut self, commit_key: impl Into<Hash>) -> Self {
        self.commit_key = Some(commit_key.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub commit_sha: Hash,
    pub commit_key: Hash,
    /// Paths applied locally, in change order
    pub applied: Vec<String>,
}

/// Canonical form of a change for key derivation: fixed field order, content by digest
#[derive(Serialize)]
struct CanonicalChange<'a> {
    op: &'static str,
    path: &'a str,
    content_hash: Option<Hash>,
    base_sha: Option<&'a Hash>,
}

/// Derive the idempotency key for `changes` on top of `parent_sha`
///
/// Independent of the order in which changes are listed.
pub fn commit_key(parent_sha: &str, changes: &[Change]) -> Result<Hash, StorageError> {
    let mut canonical: Vec<CanonicalChange<'_>> = changes
        .iter()
        .map(|change| CanonicalChange {
            op: change.op(),
            path: change.path(),
            content_hash: change.content().map(content_hash),
            base_sha: change.base_sha(),
        })
        .collect();
    canonical.sort_by(|a, b| a.path.cmp(b.path).then(a.op.cmp(b.op)));

    let serialized = serde_json::to_vec(&canonical).map_err(|e| {
        StorageError::Serialization(format!("Failed to serialize change set: {}", e))
    })?;
    let mut data = Vec::with_capacity(parent_sha.len() + serialized.len());
    data.extend_from_slice(parent_sha.as_bytes());
    data.extend_from_slice(&serialized);
    Ok(compute_hash(&data))
}

/// Append the commit key trailer to a user message
pub fn commit_message(message: &str, commit_key: &str) -> String {
    format!("{}\n\n{}{}", message, COMMIT_KEY_MARKER, commit_key)
}

/// Recover the commit key from a remote commit message
pub fn parse_commit_key(message: &str) -> Option<&str> {
    let (_, tail) = message.rsplit_once(COMMIT_KEY_MARKER)?;
    let key = tail.trim();
    (!key.is_empty() && !key.contains(char::is_whitespace)).then_some(key)
}

/// Change set for every pending local edit; paths in conflict are skipped
pub async fn pending_changes(store: &SegmentedStore) -> Result<Vec<Change>, SyncError> {
    let index = store.index().load().await?;
    let mut changes = Vec::new();
    for entry in index.entries.values() {
        let change = match entry.state {
            EntryState::Base | EntryState::Conflict => continue,
            EntryState::Added => Change::Create {
                path: entry.path.clone(),
                content: workspace_content(store, &entry.path).await?,
            },
            EntryState::Modified => Change::Update {
                path: entry.path.clone(),
                content: workspace_content(store, &entry.path).await?,
                base_sha: required_base(entry.base_sha.as_ref(), &entry.path)?,
            },
            EntryState::Deleted => Change::Delete {
                path: entry.path.clone(),
                base_sha: required_base(entry.base_sha.as_ref(), &entry.path)?,
            },
        };
        changes.push(change);
    }
    Ok(changes)
}

async fn workspace_content(store: &SegmentedStore, path: &str) -> Result<Vec<u8>, SyncError> {
    store
        .read_segment(path, BlobSegment::Workspace)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("workspace copy of {}", path)).into())
}

fn required_base(base_sha: Option<&Hash>, path: &str) -> Result<Hash, SyncError> {
    base_sha
        .cloned()
        .ok_or_else(|| StorageError::NotFound(format!("base hash of {}", path)).into())
}

pub struct PushCoordinator<'a> {
    store: &'a SegmentedStore,
    adapter: &'a RemoteAdapter,
}

impl<'a> PushCoordinator<'a> {
    pub fn new(store: &'a SegmentedStore, adapter: &'a RemoteAdapter) -> Self {
        Self { store, adapter }
    }

    pub async fn push(&self, input: PushInput) -> Result<PushOutcome, SyncError> {
        let index = self.store.index().load().await?;

        let parent_sha = input.parent_sha.unwrap_or_else(|| index.head.clone());
        if parent_sha != index.head {
            return Err(SyncError::Concurrency {
                expected: index.head,
                actual: parent_sha,
            });
        }

        let changes = match input.changes {
            Some(changes) => changes,
            None => pending_changes(self.store).await?,
        };
        if changes.is_empty() {
            return Err(SyncError::NoChanges);
        }

        let branch = input
            .branch
            .or_else(|| index.adapter_meta.as_ref().map(|meta| meta.branch.clone()))
            .filter(|branch| !branch.is_empty())
            .ok_or(SyncError::NoBranch)?;

        let commit_key = match input.commit_key {
            Some(key) => key,
            None => commit_key(&parent_sha, &changes)?,
        };
        let message = commit_message(&input.message, &commit_key);

        info!(
            branch = %branch,
            parent = %parent_sha,
            changes = changes.len(),
            flow = self.adapter.flow().name(),
            "Pushing changes"
        );
        let commit_sha = self
            .create_commit(&branch, &message, &changes, &parent_sha)
            .await?;

        if let Err(e) = self.adapter.refs().update_ref(&branch, &commit_sha).await {
            if e.is_non_fast_forward() {
                warn!(commit = %commit_sha, error = %e, "Ref update rejected, remote commit left orphaned");
                return Err(SyncError::NonFastForward { commit_sha });
            }
            warn!(commit = %commit_sha, error = %e, "Ref update failed, continuing with local update");
        }

        let applied = self.finalize(&changes).await?;
        let head = commit_sha.clone();
        let key = commit_key.clone();
        self.store
            .index()
            .update(move |index| {
                index.head = head;
                index.last_commit_key = Some(key);
            })
            .await?;

        info!(commit = %commit_sha, applied = applied.len(), "Push complete");
        Ok(PushOutcome {
            commit_sha,
            commit_key,
            applied,
        })
    }

    async fn create_commit(
        &self,
        branch: &str,
        message: &str,
        changes: &[Change],
        parent_sha: &Hash,
    ) -> Result<Hash, AdapterError> {
        match self.adapter.flow() {
            CommitFlow::Actions(committer) => {
                committer
                    .create_commit_with_actions(branch, message, changes, parent_sha)
                    .await
            }
            CommitFlow::ThreeStep(committer) => {
                let blob_ids = committer.create_blobs(changes).await?;
                let mut entries = Vec::with_capacity(changes.len());
                for change in changes {
                    let blob_id = match change {
                        Change::Delete { .. } => None,
                        _ => Some(blob_ids.get(change.path()).cloned().ok_or_else(|| {
                            AdapterError::Request(format!(
                                "No blob id returned for {}",
                                change.path()
                            ))
                        })?),
                    };
                    entries.push(TreeChange {
                        path: change.path().to_string(),
                        blob_id,
                    });
                }
                let base_tree = Some(parent_sha).filter(|sha| !sha.is_empty());
                let tree_id = committer.create_tree(&entries, base_tree).await?;
                debug!(tree = %tree_id, "Tree created");
                committer.create_commit(message, parent_sha, &tree_id).await
            }
        }
    }

    /// Apply pushed changes as the new base
    async fn finalize(&self, changes: &[Change]) -> Result<Vec<String>, SyncError> {
        let mut applied = Vec::with_capacity(changes.len());
        for change in changes {
            match change {
                Change::Create { path, content } | Change::Update { path, content, .. } => {
                    self.store
                        .write_base(path, content, blob_hash(content))
                        .await?;
                }
                Change::Delete { path, .. } => self.store.remove(path).await?,
            }
            applied.push(change.path().to_string());
        }
        Ok(applied)
    }
}
