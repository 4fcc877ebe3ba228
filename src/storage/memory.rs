//! In-memory storage backend
//!
//! Backends opened from the same [`MemoryRegistry`] with the same root name share one
//! state, so several replica handles in a process can see each other's writes. Separate
//! registries never share anything.

use crate::error::StorageError;
use crate::index::{IndexEntry, IndexFile};
use crate::storage::{matches_prefix, BlobSegment, FileListing, Segment, StorageBackend};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    index: Option<IndexFile>,
    blobs: BTreeMap<(BlobSegment, String), Vec<u8>>,
    info: BTreeMap<String, IndexEntry>,
}

/// Named in-memory roots
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    roots: Mutex<HashMap<String, Arc<RwLock<MemoryState>>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) the root named `root_name`
    pub fn open(&self, root_name: &str) -> MemoryStorage {
        let state = self
            .roots
            .lock()
            .entry(root_name.to_string())
            .or_default()
            .clone();
        MemoryStorage { state }
    }

    /// Drop a root; handles already opened keep their state
    pub fn remove(&self, root_name: &str) -> bool {
        self.roots.lock().remove(root_name).is_some()
    }

    pub fn root_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roots.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// In-memory storage backend
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
    /// Create a standalone backend not registered anywhere
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored content blobs across all segments
    pub fn blob_count(&self) -> usize {
        self.state.read().blobs.len()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn read_index(&self) -> Result<Option<IndexFile>, StorageError> {
        Ok(self.state.read().index.clone())
    }

    async fn write_index(&self, index: &IndexFile) -> Result<(), StorageError> {
        self.state.write().index = Some(index.clone());
        Ok(())
    }

    async fn read_blob(
        &self,
        path: &str,
        segment: Option<BlobSegment>,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let state = self.state.read();
        let lookup = |segment: BlobSegment| state.blobs.get(&(segment, path.to_string())).cloned();
        Ok(match segment {
            Some(segment) => lookup(segment),
            None => lookup(BlobSegment::Workspace).or_else(|| lookup(BlobSegment::Base)),
        })
    }

    async fn write_blob(
        &self,
        path: &str,
        content: &[u8],
        segment: BlobSegment,
    ) -> Result<(), StorageError> {
        self.state
            .write()
            .blobs
            .insert((segment, path.to_string()), content.to_vec());
        Ok(())
    }

    async fn delete_blob(&self, path: &str, segment: Option<Segment>) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let mut delete_one = |segment: Segment| match segment {
            Segment::Workspace => state.blobs.remove(&(BlobSegment::Workspace, path.to_string())),
            Segment::Base => state.blobs.remove(&(BlobSegment::Base, path.to_string())),
            Segment::Conflict => state.blobs.remove(&(BlobSegment::Conflict, path.to_string())),
            Segment::Info => state.info.remove(path).map(|_| Vec::new()),
        };
        match segment {
            Some(segment) => {
                delete_one(segment);
            }
            None => {
                for segment in Segment::ALL {
                    delete_one(segment);
                }
            }
        }
        Ok(())
    }

    async fn read_info(&self, path: &str) -> Result<Option<IndexEntry>, StorageError> {
        Ok(self.state.read().info.get(path).cloned())
    }

    async fn write_info(&self, entry: &IndexEntry) -> Result<(), StorageError> {
        self.state
            .write()
            .info
            .insert(entry.path.clone(), entry.clone());
        Ok(())
    }

    async fn list_files(
        &self,
        prefix: Option<&str>,
        segment: Option<Segment>,
        recursive: bool,
    ) -> Result<Vec<FileListing>, StorageError> {
        let state = self.state.read();
        let paths: BTreeSet<&String> = match segment {
            None | Some(Segment::Info) => state.info.keys().collect(),
            Some(segment) => state
                .blobs
                .keys()
                .filter(|(s, _)| Segment::from(*s) == segment)
                .map(|(_, path)| path)
                .collect(),
        };
        Ok(paths
            .into_iter()
            .filter(|path| matches_prefix(path, prefix, recursive))
            .map(|path| FileListing {
                path: path.clone(),
                info: state.info.get(path).cloned(),
            })
            .collect())
    }
}
