//! Replica index
//!
//! The index is the authoritative map from path to entry state, plus the remote head this
//! replica is synchronized to, the idempotency key of the last successful push and the
//! persisted adapter configuration.

pub mod store;

pub use store::IndexStore;

use crate::types::{Hash, RemoteType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-path state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Created locally, never seen on the remote
    Added,
    /// Local edit over a known base
    Modified,
    /// Matches the last reconciled remote value
    Base,
    /// Remote diverged from a local edit, or remote content could not be fetched
    Conflict,
    /// Deleted locally, deletion not yet pushed
    Deleted,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Added => "added",
            EntryState::Modified => "modified",
            EntryState::Base => "base",
            EntryState::Conflict => "conflict",
            EntryState::Deleted => "deleted",
        }
    }
}

/// One tracked path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub state: EntryState,
    /// Blob hash of the last value known to match the remote
    pub base_sha: Option<Hash>,
    /// Blob hash of the pending local edit
    pub workspace_sha: Option<Hash>,
    /// Competing remote blob hash, only while in conflict
    pub remote_sha: Option<Hash>,
    /// Conflict holds a local deletion against a remote change
    #[serde(default)]
    pub local_deletion: bool,
    pub updated_at: DateTime<Utc>,
}

impl IndexEntry {
    /// Create an entry with no hashes recorded yet.
    pub fn new(path: impl Into<String>, state: EntryState) -> Self {
        Self {
            path: path.into(),
            state,
            base_sha: None,
            workspace_sha: None,
            remote_sha: None,
            local_deletion: false,
            updated_at: Utc::now(),
        }
    }

    /// Entry for content observed on the remote and stored as base.
    pub fn base(path: impl Into<String>, base_sha: Hash) -> Self {
        let mut entry = Self::new(path, EntryState::Base);
        entry.base_sha = Some(base_sha);
        entry
    }

    pub fn is_conflict(&self) -> bool {
        self.state == EntryState::Conflict
    }

    /// Deleted locally, including a deletion held in conflict
    pub fn is_deleted_locally(&self) -> bool {
        self.state == EntryState::Deleted || self.local_deletion
    }

    /// True when the entry carries a local edit that is not yet on the remote.
    pub fn has_pending_edit(&self) -> bool {
        matches!(
            self.state,
            EntryState::Added | EntryState::Modified | EntryState::Deleted
        )
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Remote binding persisted with the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterMeta {
    #[serde(rename = "type")]
    pub remote_type: RemoteType,
    pub url: String,
    pub branch: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Platform-specific options (host, owner, repo, project, ...)
    #[serde(default)]
    pub opts: BTreeMap<String, String>,
}

/// Replica index: one per replica
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFile {
    /// Remote ref value this replica is synchronized to (empty before the first sync)
    pub head: Hash,
    pub entries: BTreeMap<String, IndexEntry>,
    pub last_commit_key: Option<String>,
    pub adapter_meta: Option<AdapterMeta>,
}

impl IndexFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// Entries currently in conflict, in path order.
    pub fn conflicted(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values().filter(|e| e.is_conflict())
    }
}
