//! Conflict resolver

use crate::content::SegmentedStore;
use crate::error::SyncError;
use crate::hash::blob_hash;
use crate::storage::BlobSegment;
use crate::sync::ConflictEntry;
use crate::types::Hash;
use tracing::{debug, info};

pub struct ConflictResolver<'a> {
    store: &'a SegmentedStore,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(store: &'a SegmentedStore) -> Self {
        Self { store }
    }

    /// Every path currently in conflict
    pub async fn list(&self) -> Result<Vec<ConflictEntry>, SyncError> {
        let index = self.store.index().load().await?;
        Ok(index.conflicted().map(ConflictEntry::from).collect())
    }

    /// Remote content stored for a conflicted path
    pub async fn read_conflict(&self, path: &str) -> Result<Option<Vec<u8>>, SyncError> {
        Ok(self
            .store
            .read_segment(path, BlobSegment::Conflict)
            .await?)
    }

    /// Resolve the conflict on `path`
    ///
    /// The remote side always becomes the new base: its stored content when present, its
    /// hash alone otherwise, or nothing when the remote deleted the path. `chosen` then
    /// becomes the workspace copy; without it the path simply takes the remote side.
    /// Returns `false` when `path` is not in conflict.
    pub async fn resolve(&self, path: &str, chosen: Option<&[u8]>) -> Result<bool, SyncError> {
        let Some(entry) = self.store.entry(path).await? else {
            return Ok(false);
        };
        if !entry.is_conflict() {
            return Ok(false);
        }

        match self.read_conflict(path).await? {
            Some(remote) => {
                let remote_sha = entry
                    .remote_sha
                    .clone()
                    .unwrap_or_else(|| blob_hash(&remote));
                self.store.write_base(path, &remote, remote_sha).await?;
            }
            None => {
                self.store
                    .promote_base_sha(path, entry.remote_sha.clone())
                    .await?;
            }
        }

        match chosen {
            Some(content) => {
                self.store.write_workspace(path, content).await?;
            }
            None => {
                self.store.clear_workspace(path).await?;
            }
        }

        let resolved = self.store.clear_conflict(path).await?;
        info!(
            path,
            state = resolved.as_ref().map_or("removed", |e| e.state.as_str()),
            "Conflict resolved"
        );
        Ok(true)
    }

    /// Settle a batch of conflicts at once and advance the head to `head`
    ///
    /// Only applies when every listed path has converged (`base_sha == remote_sha`) or has
    /// already left conflict. Otherwise nothing changes and `false` is returned.
    pub async fn resolve_all(
        &self,
        conflicts: &[ConflictEntry],
        head: &Hash,
    ) -> Result<bool, SyncError> {
        if conflicts.is_empty() {
            return Ok(false);
        }

        let mut pending = Vec::new();
        for conflict in conflicts {
            match self.store.entry(&conflict.path).await? {
                Some(entry) if entry.is_conflict() => {
                    if entry.base_sha != entry.remote_sha {
                        debug!(path = %conflict.path, "Conflict not convergent, batch left unresolved");
                        return Ok(false);
                    }
                    pending.push(entry);
                }
                _ => {}
            }
        }

        for entry in &pending {
            if let (Some(remote), Some(remote_sha)) = (
                self.read_conflict(&entry.path).await?,
                entry.remote_sha.clone(),
            ) {
                self.store.write_base(&entry.path, &remote, remote_sha).await?;
            }
            self.store.clear_conflict(&entry.path).await?;
        }

        let head = head.clone();
        self.store
            .index()
            .update(move |index| index.head = head)
            .await?;
        info!(resolved = pending.len(), "Conflict batch resolved");
        Ok(true)
    }
}
