//! Index Store
//!
//! Loads and persists the [`IndexFile`] through the storage backend. The backend is the
//! single source of truth: the in-memory copy is dropped on every mutating call and
//! reloaded on the next read.

use crate::error::StorageError;
use crate::index::{IndexEntry, IndexFile};
use crate::storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct IndexStore {
    storage: Arc<dyn StorageBackend>,
    cache: Mutex<Option<IndexFile>>,
}

impl IndexStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            cache: Mutex::new(None),
        }
    }

    /// Load the index
    ///
    /// A missing index yields a fresh empty one. An unreadable index is reset: a fresh
    /// empty index is persisted in its place and returned. Neither case is an error; only a
    /// failure to persist the replacement is.
    pub async fn load(&self) -> Result<IndexFile, StorageError> {
        if let Some(cached) = self.cache.lock().clone() {
            return Ok(cached);
        }

        let index = match self.storage.read_index().await {
            Ok(Some(index)) => index,
            Ok(None) => {
                debug!("No index found, starting from an empty index");
                IndexFile::new()
            }
            Err(e) => {
                warn!(error = %e, "Index unreadable, resetting to an empty index");
                let fresh = IndexFile::new();
                self.storage.write_index(&fresh).await?;
                fresh
            }
        };

        *self.cache.lock() = Some(index.clone());
        Ok(index)
    }

    /// Persist the whole index
    pub async fn save(&self, index: &IndexFile) -> Result<(), StorageError> {
        self.invalidate();
        self.storage.write_index(index).await
    }

    pub async fn get(&self, path: &str) -> Result<Option<IndexEntry>, StorageError> {
        Ok(self.load().await?.entries.get(path).cloned())
    }

    /// Insert or replace the entry for `entry.path`
    pub async fn upsert(&self, entry: IndexEntry) -> Result<(), StorageError> {
        let mut index = self.load().await?;
        index.entries.insert(entry.path.clone(), entry);
        self.save(&index).await
    }

    pub async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let mut index = self.load().await?;
        if index.entries.remove(path).is_some() {
            self.save(&index).await?;
        }
        Ok(())
    }

    /// Load, mutate and persist the index in one step
    pub async fn update<F>(&self, mutate: F) -> Result<IndexFile, StorageError>
    where
        F: FnOnce(&mut IndexFile),
    {
        let mut index = self.load().await?;
        mutate(&mut index);
        self.save(&index).await?;
        Ok(index)
    }

    fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}
