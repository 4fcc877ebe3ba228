//! Remote synchronizer
//!
//! A pull runs in three phases against one [`RemoteSnapshot`]:
//!
//! 1. gather a [`LocalView`] for every path known locally or remotely;
//! 2. [`classify`] each path into a [`PullAction`] (pure, no I/O);
//! 3. fetch the content the actions need in one batch, then apply them.
//!
//! The replica head advances to the snapshot head only when no path ended in conflict.

use crate::content::SegmentedStore;
use crate::error::SyncError;
use crate::hash::blob_hash;
use crate::index::{EntryState, IndexEntry};
use crate::remote::RemoteSnapshot;
use crate::storage::BlobSegment;
use crate::sync::ConflictEntry;
use crate::types::Hash;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Local facts about one path, gathered before classification
#[derive(Debug, Clone, Default)]
pub struct LocalView {
    pub entry: Option<IndexEntry>,
    /// Blob hash of a workspace copy not tracked by the index
    pub untracked_workspace_sha: Option<Hash>,
    /// Blob hash of the stored base content, computed only when the recorded base hash
    /// disagrees with the remote
    pub base_content_sha: Option<Hash>,
}

/// What a pull does with one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullAction {
    /// Nothing to do
    Keep,
    /// Remote unchanged, but the recorded base hash was stale
    HealBase { base_sha: Hash },
    /// Take the remote content as the new base
    Fetch { remote_sha: Hash, clear_workspace: bool },
    /// The local edit already equals the remote: promote it to base
    Converge { remote_sha: Hash },
    /// Sides disagree
    Conflict { conflict: ConflictEntry, fetch: bool },
    /// Remote deletion of an unedited path
    RemoveLocal,
    /// Conflict no longer has a remote side to disagree with
    ClearConflict,
}

/// Result of a pull
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOutcome {
    pub conflicts: Vec<ConflictEntry>,
    /// Replica head after the pull
    pub head: Hash,
    /// Whether the head moved to the snapshot head
    pub advanced: bool,
    /// Paths whose base was replaced or created
    pub updated: Vec<String>,
    /// Paths removed after a remote deletion
    pub removed: Vec<String>,
}

impl PullOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Classify one path against the remote
pub fn classify(path: &str, local: &LocalView, remote_sha: Option<&Hash>) -> PullAction {
    match (&local.entry, remote_sha) {
        (None, None) => PullAction::Keep,
        (None, Some(remote)) => classify_untracked(path, local, remote),
        (Some(entry), Some(remote)) => classify_tracked(entry, local, remote),
        (Some(entry), None) => classify_remote_deleted(entry),
    }
}

fn classify_untracked(path: &str, local: &LocalView, remote: &Hash) -> PullAction {
    match &local.untracked_workspace_sha {
        None => PullAction::Fetch {
            remote_sha: remote.clone(),
            clear_workspace: false,
        },
        // Untracked local content is never overwritten, even when identical
        Some(workspace) => PullAction::Conflict {
            conflict: ConflictEntry {
                path: path.to_string(),
                base_sha: None,
                workspace_sha: Some(workspace.clone()),
                remote_sha: Some(remote.clone()),
            },
            fetch: true,
        },
    }
}

fn classify_tracked(entry: &IndexEntry, local: &LocalView, remote: &Hash) -> PullAction {
    let conflict = || PullAction::Conflict {
        conflict: ConflictEntry {
            path: entry.path.clone(),
            base_sha: entry.base_sha.clone(),
            workspace_sha: entry.workspace_sha.clone(),
            remote_sha: Some(remote.clone()),
        },
        fetch: true,
    };
    let workspace_is_remote = entry.workspace_sha.as_ref() == Some(remote);
    let base_unchanged = entry.base_sha.as_ref() == Some(remote);
    let base_content_unchanged = local.base_content_sha.as_ref() == Some(remote);

    match entry.state {
        EntryState::Conflict => {
            if workspace_is_remote {
                PullAction::Converge {
                    remote_sha: remote.clone(),
                }
            } else if entry.workspace_sha.is_none() && !entry.local_deletion {
                // Earlier fetch failed; try again
                PullAction::Fetch {
                    remote_sha: remote.clone(),
                    clear_workspace: false,
                }
            } else {
                conflict()
            }
        }
        EntryState::Added => {
            if workspace_is_remote {
                PullAction::Converge {
                    remote_sha: remote.clone(),
                }
            } else {
                conflict()
            }
        }
        EntryState::Deleted => {
            if base_unchanged {
                PullAction::Keep
            } else if base_content_unchanged {
                PullAction::HealBase {
                    base_sha: remote.clone(),
                }
            } else {
                conflict()
            }
        }
        EntryState::Base | EntryState::Modified => {
            if base_unchanged {
                return PullAction::Keep;
            }
            if base_content_unchanged {
                return PullAction::HealBase {
                    base_sha: remote.clone(),
                };
            }
            match &entry.workspace_sha {
                None => PullAction::Fetch {
                    remote_sha: remote.clone(),
                    clear_workspace: false,
                },
                Some(workspace) if Some(workspace) == entry.base_sha.as_ref() => {
                    PullAction::Fetch {
                        remote_sha: remote.clone(),
                        clear_workspace: true,
                    }
                }
                Some(_) if workspace_is_remote => PullAction::Converge {
                    remote_sha: remote.clone(),
                },
                Some(_) => conflict(),
            }
        }
    }
}

fn classify_remote_deleted(entry: &IndexEntry) -> PullAction {
    let unedited = entry.workspace_sha.is_none() || entry.workspace_sha == entry.base_sha;
    match entry.state {
        // Never existed remotely
        EntryState::Added => PullAction::Keep,
        EntryState::Deleted | EntryState::Base => PullAction::RemoveLocal,
        EntryState::Modified if unedited => PullAction::RemoveLocal,
        EntryState::Modified => PullAction::Conflict {
            conflict: ConflictEntry {
                path: entry.path.clone(),
                base_sha: entry.base_sha.clone(),
                workspace_sha: entry.workspace_sha.clone(),
                remote_sha: None,
            },
            fetch: false,
        },
        EntryState::Conflict => {
            if entry.workspace_sha.is_none() {
                PullAction::RemoveLocal
            } else if entry.base_sha.is_none() {
                PullAction::ClearConflict
            } else {
                PullAction::Conflict {
                    conflict: ConflictEntry {
                        path: entry.path.clone(),
                        base_sha: entry.base_sha.clone(),
                        workspace_sha: entry.workspace_sha.clone(),
                        remote_sha: None,
                    },
                    fetch: false,
                }
            }
        }
    }
}

/// Pull reconciliation over a segmented store
pub struct Synchronizer<'a> {
    store: &'a SegmentedStore,
}

impl<'a> Synchronizer<'a> {
    pub fn new(store: &'a SegmentedStore) -> Self {
        Self { store }
    }

    /// Reconcile `snapshot` into the replica
    ///
    /// Storage failures propagate. Content the remote cannot deliver turns the affected
    /// paths into conflicts instead.
    pub async fn pull(&self, snapshot: &RemoteSnapshot) -> Result<PullOutcome, SyncError> {
        let index = self.store.index().load().await?;
        let paths: BTreeSet<&String> = index
            .entries
            .keys()
            .chain(snapshot.remote_hashes.keys())
            .collect();

        let mut plan = Vec::with_capacity(paths.len());
        for path in paths {
            let remote_sha = snapshot.remote_hashes.get(path);
            let local = self.local_view(path, index.entries.get(path), remote_sha).await?;
            let action = classify(path, &local, remote_sha);
            if action != PullAction::Keep {
                debug!(path = %path, action = ?action, "Pull classified path");
            }
            plan.push((path.clone(), action));
        }

        let wanted: Vec<String> = plan
            .iter()
            .filter(|(_, action)| {
                matches!(
                    action,
                    PullAction::Fetch { .. } | PullAction::Conflict { fetch: true, .. }
                )
            })
            .map(|(path, _)| path.clone())
            .collect();
        let fetched = match snapshot.fetch_content(&wanted).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, paths = wanted.len(), "Remote content fetch failed");
                BTreeMap::new()
            }
        };

        let mut outcome = PullOutcome::default();
        for (path, action) in plan {
            self.apply(&path, action, &fetched, &mut outcome).await?;
        }

        if outcome.conflicts.is_empty() {
            let head = snapshot.head_sha.clone();
            self.store
                .index()
                .update(|index| index.head = head)
                .await?;
            outcome.advanced = true;
            info!(head = %snapshot.head_sha, updated = outcome.updated.len(), removed = outcome.removed.len(), "Pull complete");
        } else {
            warn!(conflicts = outcome.conflicts.len(), "Pull finished with conflicts, head unchanged");
        }
        outcome.head = self.store.index().load().await?.head;
        Ok(outcome)
    }

    async fn local_view(
        &self,
        path: &str,
        entry: Option<&IndexEntry>,
        remote_sha: Option<&Hash>,
    ) -> Result<LocalView, SyncError> {
        let mut view = LocalView {
            entry: entry.cloned(),
            ..LocalView::default()
        };
        match entry {
            None => {
                view.untracked_workspace_sha = self
                    .store
                    .read_segment(path, BlobSegment::Workspace)
                    .await?
                    .map(|content| blob_hash(&content));
            }
            Some(entry) => {
                let stale = remote_sha.is_some() && entry.base_sha.as_ref() != remote_sha;
                if stale && entry.base_sha.is_some() {
                    view.base_content_sha = self
                        .store
                        .read_segment(path, BlobSegment::Base)
                        .await?
                        .map(|content| blob_hash(&content));
                }
            }
        }
        Ok(view)
    }

    async fn apply(
        &self,
        path: &str,
        action: PullAction,
        fetched: &BTreeMap<String, Vec<u8>>,
        outcome: &mut PullOutcome,
    ) -> Result<(), SyncError> {
        match action {
            PullAction::Keep => {}
            PullAction::HealBase { base_sha } => {
                self.store.heal_base_sha(path, &base_sha).await;
            }
            PullAction::Fetch {
                remote_sha,
                clear_workspace,
            } => match fetched.get(path) {
                Some(content) => {
                    if clear_workspace {
                        self.store.clear_workspace(path).await?;
                    }
                    let entry = self.store.write_base(path, content, remote_sha).await?;
                    if entry.is_conflict() {
                        self.store.clear_conflict(path).await?;
                    }
                    outcome.updated.push(path.to_string());
                }
                None => {
                    let entry = self.store.entry(path).await?;
                    let mut conflict = entry
                        .as_ref()
                        .map(ConflictEntry::from)
                        .unwrap_or_else(|| ConflictEntry::new(path));
                    conflict.remote_sha = Some(remote_sha);
                    self.record_conflict(conflict, outcome).await?;
                }
            },
            PullAction::Converge { remote_sha } => {
                match self.store.read_segment(path, BlobSegment::Workspace).await? {
                    Some(content) => {
                        self.store.write_base(path, &content, remote_sha).await?;
                        self.store.clear_conflict(path).await?;
                        outcome.updated.push(path.to_string());
                    }
                    None => {
                        let mut conflict = ConflictEntry::new(path);
                        conflict.remote_sha = Some(remote_sha);
                        self.record_conflict(conflict, outcome).await?;
                    }
                }
            }
            PullAction::Conflict { conflict, fetch } => {
                if fetch {
                    if let Some(content) = fetched.get(path) {
                        self.store.write_conflict(path, content).await?;
                    }
                }
                self.record_conflict(conflict, outcome).await?;
            }
            PullAction::RemoveLocal => {
                self.store.remove(path).await?;
                outcome.removed.push(path.to_string());
            }
            PullAction::ClearConflict => {
                self.store.clear_conflict(path).await?;
            }
        }
        Ok(())
    }

    async fn record_conflict(
        &self,
        conflict: ConflictEntry,
        outcome: &mut PullOutcome,
    ) -> Result<(), SyncError> {
        let entry = self.store.mark_conflict(&conflict).await?;
        warn!(path = %conflict.path, remote_sha = ?entry.remote_sha, "Conflict recorded");
        outcome.conflicts.push(ConflictEntry::from(&entry));
        Ok(())
    }
}
