//! Synchronization engine
//!
//! - [`pull`]: reconcile a remote snapshot into the replica
//! - [`push`]: commit pending local changes to the remote
//! - [`conflict`]: inspect and resolve conflicts

pub mod conflict;
pub mod pull;
pub mod push;

pub use conflict::ConflictResolver;
pub use pull::{PullOutcome, Synchronizer};
pub use push::{PushCoordinator, PushInput, PushOutcome};

use crate::index::IndexEntry;
use crate::types::Hash;
use serde::{Deserialize, Serialize};

/// One file-level change to send to the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Change {
    Create {
        path: String,
        content: Vec<u8>,
    },
    Update {
        path: String,
        content: Vec<u8>,
        base_sha: Hash,
    },
    Delete {
        path: String,
        base_sha: Hash,
    },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Change::Create { path, .. } | Change::Update { path, .. } | Change::Delete { path, .. } => {
                path
            }
        }
    }

    /// New content for creates and updates
    pub fn content(&self) -> Option<&[u8]> {
        match self {
            Change::Create { content, .. } | Change::Update { content, .. } => Some(content),
            Change::Delete { .. } => None,
        }
    }

    pub fn base_sha(&self) -> Option<&Hash> {
        match self {
            Change::Create { .. } => None,
            Change::Update { base_sha, .. } | Change::Delete { base_sha, .. } => Some(base_sha),
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Change::Create { .. } => "create",
            Change::Update { .. } => "update",
            Change::Delete { .. } => "delete",
        }
    }
}

/// A path whose local and remote sides disagree
///
/// `remote_sha` is absent when the remote deleted a path that has local edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub path: String,
    pub base_sha: Option<Hash>,
    pub workspace_sha: Option<Hash>,
    pub remote_sha: Option<Hash>,
}

impl ConflictEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base_sha: None,
            workspace_sha: None,
            remote_sha: None,
        }
    }
}

impl From<&IndexEntry> for ConflictEntry {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            path: entry.path.clone(),
            base_sha: entry.base_sha.clone(),
            workspace_sha: entry.workspace_sha.clone(),
            remote_sha: entry.remote_sha.clone(),
        }
    }
}
