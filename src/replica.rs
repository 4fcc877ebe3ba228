//! Replica facade
//!
//! One [`Replica`] tracks one remote ref over one storage backend. Operations that mutate
//! state take `&mut self`: a replica has a single writer, and the borrow checker enforces it
//! for callers sharing one instance.

use crate::content::SegmentedStore;
use crate::error::SyncError;
use crate::index::{AdapterMeta, EntryState, IndexEntry, IndexFile, IndexStore};
use crate::remote::{RemoteAdapter, RemoteSnapshot};
use crate::storage::StorageBackend;
use crate::sync::push::pending_changes;
use crate::sync::{
    Change, ConflictEntry, ConflictResolver, PullOutcome, PushCoordinator, PushInput,
    PushOutcome, Synchronizer,
};
use crate::types::Hash;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Replica {
    storage: Arc<dyn StorageBackend>,
    store: SegmentedStore,
    adapter: Option<RemoteAdapter>,
}

impl Replica {
    /// Open a replica over `storage`, initializing the backend and loading (or resetting) the index
    pub async fn open(storage: Arc<dyn StorageBackend>) -> Result<Self, SyncError> {
        storage.init().await?;
        let index = Arc::new(IndexStore::new(storage.clone()));
        let loaded = index.load().await?;
        debug!(head = %loaded.head, entries = loaded.entries.len(), "Replica opened");
        Ok(Self {
            store: SegmentedStore::new(storage.clone(), index),
            storage,
            adapter: None,
        })
    }

    pub fn with_adapter(mut self, adapter: RemoteAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn set_adapter(&mut self, adapter: RemoteAdapter) {
        self.adapter = Some(adapter);
    }

    pub fn adapter(&self) -> Option<&RemoteAdapter> {
        self.adapter.as_ref()
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub async fn index(&self) -> Result<IndexFile, SyncError> {
        Ok(self.store.index().load().await?)
    }

    pub async fn head(&self) -> Result<Hash, SyncError> {
        Ok(self.index().await?.head)
    }

    pub async fn adapter_meta(&self) -> Result<Option<AdapterMeta>, SyncError> {
        Ok(self.index().await?.adapter_meta)
    }

    /// Persist the remote binding after validating it
    pub async fn set_adapter_meta(&mut self, meta: AdapterMeta) -> Result<(), SyncError> {
        meta.validate().map_err(SyncError::InvalidInput)?;
        self.store
            .index()
            .update(move |index| index.adapter_meta = Some(meta))
            .await?;
        Ok(())
    }

    pub async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let path = normalize_path(path)?;
        Ok(self.store.read(path).await?)
    }

    pub async fn write_file(&mut self, path: &str, content: &[u8]) -> Result<IndexEntry, SyncError> {
        let path = normalize_path(path)?;
        let entry = self.store.write_workspace(path, content).await?;
        debug!(path, state = entry.state.as_str(), "File written");
        Ok(entry)
    }

    /// Delete a tracked file
    ///
    /// Returns `false` when the path is not tracked or already deleted.
    pub async fn delete_file(&mut self, path: &str) -> Result<bool, SyncError> {
        let path = normalize_path(path)?;
        let Some(entry) = self.store.entry(path).await? else {
            return Ok(false);
        };
        match entry.state {
            EntryState::Conflict => Err(SyncError::Conflicted(path.to_string())),
            EntryState::Deleted => Ok(false),
            EntryState::Added => {
                // Never pushed: nothing to tell the remote
                self.store.remove(path).await?;
                debug!(path, "Added file rolled back");
                Ok(true)
            }
            EntryState::Base | EntryState::Modified => {
                self.store.mark_deleted(path).await?;
                debug!(path, "File marked deleted");
                Ok(true)
            }
        }
    }

    /// Rename a file: delete `from`, create `to` with its content
    pub async fn rename_file(&mut self, from: &str, to: &str) -> Result<(), SyncError> {
        let from = normalize_path(from)?;
        let to = normalize_path(to)?;
        if from == to {
            return Ok(());
        }
        let content = self
            .read_file(from)
            .await?
            .ok_or_else(|| SyncError::NotFound(from.to_string()))?;
        if let Some(target) = self.store.entry(to).await? {
            if target.is_conflict() {
                return Err(SyncError::Conflicted(to.to_string()));
            }
        }
        if let Some(source) = self.store.entry(from).await? {
            if source.is_conflict() {
                return Err(SyncError::Conflicted(from.to_string()));
            }
        }

        self.write_file(to, &content).await?;
        self.delete_file(from).await?;
        info!(from, to, "File renamed");
        Ok(())
    }

    /// Tracked paths under `prefix`, local deletions excluded
    pub async fn list_files(
        &self,
        prefix: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<String>, SyncError> {
        let listings = self.store.list(prefix, recursive).await?;
        Ok(listings.into_iter().map(|l| l.path).collect())
    }

    pub async fn pending_changes(&self) -> Result<Vec<Change>, SyncError> {
        pending_changes(&self.store).await
    }

    pub async fn pull(&mut self, snapshot: &RemoteSnapshot) -> Result<PullOutcome, SyncError> {
        Synchronizer::new(&self.store).pull(snapshot).await
    }

    /// Resolve `reference` (default: the configured branch) on the remote and pull it
    pub async fn pull_remote(&mut self, reference: Option<&str>) -> Result<PullOutcome, SyncError> {
        let adapter = self.adapter.as_ref().ok_or(SyncError::NoAdapter)?;
        let reference = match reference {
            Some(reference) => reference.to_string(),
            None => self
                .store
                .index()
                .load()
                .await?
                .adapter_meta
                .map(|meta| meta.branch)
                .filter(|branch| !branch.is_empty())
                .ok_or(SyncError::NoBranch)?,
        };

        let head = adapter.refs().resolve_ref(&reference).await?;
        debug!(reference = %reference, head = %head, "Resolved remote ref");
        let snapshot = adapter.refs().fetch_snapshot(&head).await?;
        Synchronizer::new(&self.store).pull(&snapshot).await
    }

    pub async fn push(&mut self, input: PushInput) -> Result<PushOutcome, SyncError> {
        let adapter = self.adapter.as_ref().ok_or(SyncError::NoAdapter)?;
        PushCoordinator::new(&self.store, adapter).push(input).await
    }

    pub async fn conflicts(&self) -> Result<Vec<ConflictEntry>, SyncError> {
        ConflictResolver::new(&self.store).list().await
    }

    pub async fn read_conflict(&self, path: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let path = normalize_path(path)?;
        ConflictResolver::new(&self.store).read_conflict(path).await
    }

    pub async fn resolve_conflict(
        &mut self,
        path: &str,
        chosen: Option<&[u8]>,
    ) -> Result<bool, SyncError> {
        let path = normalize_path(path)?;
        ConflictResolver::new(&self.store).resolve(path, chosen).await
    }

    pub async fn resolve_all(
        &mut self,
        conflicts: &[ConflictEntry],
        head: &Hash,
    ) -> Result<bool, SyncError> {
        ConflictResolver::new(&self.store)
            .resolve_all(conflicts, head)
            .await
    }
}

/// Strip a leading `/` and reject paths that are empty or escape the root
fn normalize_path(path: &str) -> Result<&str, SyncError> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Err(SyncError::InvalidInput("Path cannot be empty".to_string()));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(SyncError::InvalidInput(format!(
            "Path escapes the replica root: {}",
            path
        )));
    }
    Ok(path)
}
