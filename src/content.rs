//! Segmented content store
//!
//! View over the storage backend exposing the per-path segments (workspace, base, conflict,
//! info). Every content mutation goes through here so that the path's [`IndexEntry`] (info
//! record and index entry alike) always reflects what the segments hold.

use crate::error::StorageError;
use crate::hash::blob_hash;
use crate::index::{EntryState, IndexEntry, IndexStore};
use crate::storage::{BlobSegment, FileListing, Segment, StorageBackend};
use crate::sync::ConflictEntry;
use crate::types::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct SegmentedStore {
    storage: Arc<dyn StorageBackend>,
    index: Arc<IndexStore>,
}

impl SegmentedStore {
    pub fn new(storage: Arc<dyn StorageBackend>, index: Arc<IndexStore>) -> Self {
        Self { storage, index }
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Read the current content of `path`: workspace, then base
    ///
    /// Paths deleted locally read as absent even though their base is retained.
    pub async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(entry) = self.index.get(path).await? {
            if entry.is_deleted_locally() {
                return Ok(None);
            }
        }
        self.storage.read_blob(path, None).await
    }

    /// Read exactly one segment, without fallback
    pub async fn read_segment(
        &self,
        path: &str,
        segment: BlobSegment,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.storage.read_blob(path, Some(segment)).await
    }

    pub async fn entry(&self, path: &str) -> Result<Option<IndexEntry>, StorageError> {
        self.index.get(path).await
    }

    /// Write a local edit
    ///
    /// Content identical to the base reverts the path to `base` and drops the workspace copy.
    /// Paths in conflict stay in conflict with the new workspace hash recorded.
    pub async fn write_workspace(
        &self,
        path: &str,
        content: &[u8],
    ) -> Result<IndexEntry, StorageError> {
        let mut entry = self
            .entry(path)
            .await?
            .unwrap_or_else(|| IndexEntry::new(path, EntryState::Added));

        self.storage
            .write_blob(path, content, BlobSegment::Workspace)
            .await?;
        entry.workspace_sha = Some(blob_hash(content));
        if entry.state == EntryState::Deleted {
            entry.state = EntryState::Modified;
        }
        self.settle(&mut entry).await?;
        self.put_entry(&entry).await?;
        Ok(entry)
    }

    /// Write reconciled remote content as the path's base
    ///
    /// `base_sha` is the remote object id for the content. A workspace copy equal to the new
    /// base is dropped; a differing one keeps the path `modified`. A local deletion is
    /// superseded by the new base. Conflict state and the
    /// stored remote hash are left untouched, see [`SegmentedStore::clear_conflict`].
    pub async fn write_base(
        &self,
        path: &str,
        content: &[u8],
        base_sha: Hash,
    ) -> Result<IndexEntry, StorageError> {
        let mut entry = self
            .entry(path)
            .await?
            .unwrap_or_else(|| IndexEntry::new(path, EntryState::Base));

        self.storage
            .write_blob(path, content, BlobSegment::Base)
            .await?;
        entry.base_sha = Some(base_sha);
        if entry.state == EntryState::Deleted {
            entry.state = EntryState::Base;
        }
        self.settle(&mut entry).await?;
        self.put_entry(&entry).await?;
        Ok(entry)
    }

    /// Store the remote side of a conflict for inspection
    pub async fn write_conflict(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        self.storage
            .write_blob(path, content, BlobSegment::Conflict)
            .await
    }

    /// Put a path into conflict against `conflict.remote_sha`
    ///
    /// Base and workspace hashes already on the entry are kept; the conflict's own hashes
    /// only fill the ones the entry lacks.
    pub async fn mark_conflict(&self, conflict: &ConflictEntry) -> Result<IndexEntry, StorageError> {
        let mut entry = self
            .entry(&conflict.path)
            .await?
            .unwrap_or_else(|| IndexEntry::new(conflict.path.as_str(), EntryState::Conflict));
        if entry.state == EntryState::Deleted {
            entry.local_deletion = true;
        }
        entry.state = EntryState::Conflict;
        entry.remote_sha = conflict.remote_sha.clone();
        if entry.base_sha.is_none() {
            entry.base_sha = conflict.base_sha.clone();
        }
        if entry.workspace_sha.is_none() {
            entry.workspace_sha = conflict.workspace_sha.clone();
        }
        self.put_entry(&entry).await?;
        Ok(entry)
    }

    /// Set the base hash without content: the stale base segment is dropped so no content
    /// is ever labelled with a hash it does not have
    pub async fn promote_base_sha(
        &self,
        path: &str,
        base_sha: Option<Hash>,
    ) -> Result<Option<IndexEntry>, StorageError> {
        self.storage.delete_blob(path, Some(Segment::Base)).await?;
        let Some(mut entry) = self.entry(path).await? else {
            return Ok(None);
        };
        entry.base_sha = base_sha;
        self.put_entry(&entry).await?;
        Ok(Some(entry))
    }

    /// Leave conflict: drop the conflict segment and remote hash, then derive the state from
    /// the remaining base and workspace hashes. Returns `None` when nothing is left to track.
    pub async fn clear_conflict(&self, path: &str) -> Result<Option<IndexEntry>, StorageError> {
        let Some(mut entry) = self.entry(path).await? else {
            return Ok(None);
        };
        self.storage
            .delete_blob(path, Some(Segment::Conflict))
            .await?;
        entry.remote_sha = None;
        entry.local_deletion = false;
        entry.state = if entry.base_sha.is_some() {
            EntryState::Base
        } else {
            EntryState::Added
        };
        self.settle(&mut entry).await?;

        if entry.base_sha.is_none() && entry.workspace_sha.is_none() {
            self.remove(path).await?;
            return Ok(None);
        }
        self.put_entry(&entry).await?;
        Ok(Some(entry))
    }

    /// Drop the workspace copy of `path`, falling back to its base
    pub async fn clear_workspace(&self, path: &str) -> Result<Option<IndexEntry>, StorageError> {
        self.storage
            .delete_blob(path, Some(Segment::Workspace))
            .await?;
        let Some(mut entry) = self.entry(path).await? else {
            return Ok(None);
        };
        entry.workspace_sha = None;
        self.settle(&mut entry).await?;
        self.put_entry(&entry).await?;
        Ok(Some(entry))
    }

    /// Record a local deletion: the workspace copy goes, the base stays for the pending push
    pub async fn mark_deleted(&self, path: &str) -> Result<Option<IndexEntry>, StorageError> {
        self.storage
            .delete_blob(path, Some(Segment::Workspace))
            .await?;
        let Some(mut entry) = self.entry(path).await? else {
            return Ok(None);
        };
        entry.workspace_sha = None;
        entry.state = EntryState::Deleted;
        self.put_entry(&entry).await?;
        Ok(Some(entry))
    }

    /// Forget `path` entirely: every segment, its info record and its index entry
    pub async fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.storage.delete_blob(path, None).await?;
        self.index.remove(path).await
    }

    /// Persist `entry` to both the info segment and the index
    pub async fn put_entry(&self, entry: &IndexEntry) -> Result<(), StorageError> {
        let mut entry = entry.clone();
        entry.touch();
        self.storage.write_info(&entry).await?;
        self.index.upsert(entry).await
    }

    /// Rewrite a stale base hash. Failures are logged and otherwise ignored.
    pub async fn heal_base_sha(&self, path: &str, base_sha: &Hash) {
        let result = async {
            if let Some(mut entry) = self.entry(path).await? {
                debug!(path, base_sha = %base_sha, "Healing stale base hash");
                entry.base_sha = Some(base_sha.clone());
                self.put_entry(&entry).await?;
            }
            Ok::<(), StorageError>(())
        }
        .await;
        if let Err(e) = result {
            warn!(path, error = %e, "Failed to heal base hash");
        }
    }

    /// Tracked paths under `prefix`, excluding local deletions
    pub async fn list(
        &self,
        prefix: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<FileListing>, StorageError> {
        let listings = self.storage.list_files(prefix, None, recursive).await?;
        Ok(listings
            .into_iter()
            .filter(|l| {
                l.info
                    .as_ref()
                    .map_or(true, |info| !info.is_deleted_locally())
            })
            .collect())
    }

    /// Derive the state from the entry's hashes after a content change
    async fn settle(&self, entry: &mut IndexEntry) -> Result<(), StorageError> {
        if entry.state == EntryState::Conflict {
            return Ok(());
        }
        match (&entry.base_sha, &entry.workspace_sha) {
            (Some(base), Some(workspace)) if base == workspace => {
                self.storage
                    .delete_blob(&entry.path, Some(Segment::Workspace))
                    .await?;
                entry.workspace_sha = None;
                entry.state = EntryState::Base;
            }
            (Some(_), Some(_)) => entry.state = EntryState::Modified,
            (None, Some(_)) => entry.state = EntryState::Added,
            (Some(_), None) => {
                if entry.state != EntryState::Deleted {
                    entry.state = EntryState::Base;
                }
            }
            (None, None) => {}
        }
        Ok(())
    }
}
