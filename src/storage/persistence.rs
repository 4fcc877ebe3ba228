//! Disk-backed storage using sled
//!
//! Layout: one sled tree per segment (`workspace`, `base`, `conflict`, `info`) keyed by
//! path, and the index under a fixed key in the default tree. Index and info records use
//! the versioned encoding in [`crate::storage::codec`].

use crate::error::StorageError;
use crate::index::{IndexEntry, IndexFile};
use crate::storage::codec;
use crate::storage::{matches_prefix, BlobSegment, FileListing, Segment, StorageBackend};
use async_trait::async_trait;
use std::path::Path;

const INDEX_KEY: &[u8] = b"apigit:index";

/// Sled-based implementation of StorageBackend
pub struct SledStorage {
    db: sled::Db,
    workspace: sled::Tree,
    base: sled::Tree,
    conflict: sled::Tree,
    info: sled::Tree,
}

impl SledStorage {
    /// Open (or create) a database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::Backend(format!(
                "Failed to open sled database at {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Ok(Self {
            workspace: db.open_tree(Segment::Workspace.as_str())?,
            base: db.open_tree(Segment::Base.as_str())?,
            conflict: db.open_tree(Segment::Conflict.as_str())?,
            info: db.open_tree(Segment::Info.as_str())?,
            db,
        })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, segment: Segment) -> &sled::Tree {
        match segment {
            Segment::Workspace => &self.workspace,
            Segment::Base => &self.base,
            Segment::Conflict => &self.conflict,
            Segment::Info => &self.info,
        }
    }

    fn decode_key(key: &[u8]) -> Result<String, StorageError> {
        String::from_utf8(key.to_vec())
            .map_err(|e| StorageError::Serialization(format!("Invalid path key: {}", e)))
    }
}

#[async_trait]
impl StorageBackend for SledStorage {
    async fn init(&self) -> Result<(), StorageError> {
        self.flush()
    }

    async fn read_index(&self) -> Result<Option<IndexFile>, StorageError> {
        match self.db.get(INDEX_KEY)? {
            Some(bytes) => codec::decode_index(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn write_index(&self, index: &IndexFile) -> Result<(), StorageError> {
        let bytes = codec::encode_index(index)?;
        self.db.insert(INDEX_KEY, bytes)?;
        Ok(())
    }

    async fn read_blob(
        &self,
        path: &str,
        segment: Option<BlobSegment>,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let order: &[BlobSegment] = match segment {
            Some(ref segment) => std::slice::from_ref(segment),
            None => &[BlobSegment::Workspace, BlobSegment::Base],
        };
        for segment in order {
            if let Some(value) = self.tree((*segment).into()).get(path.as_bytes())? {
                return Ok(Some(value.to_vec()));
            }
        }
        Ok(None)
    }

    async fn write_blob(
        &self,
        path: &str,
        content: &[u8],
        segment: BlobSegment,
    ) -> Result<(), StorageError> {
        self.tree(segment.into()).insert(path.as_bytes(), content)?;
        Ok(())
    }

    async fn delete_blob(&self, path: &str, segment: Option<Segment>) -> Result<(), StorageError> {
        match segment {
            Some(segment) => {
                self.tree(segment).remove(path.as_bytes())?;
            }
            None => {
                for segment in Segment::ALL {
                    self.tree(segment).remove(path.as_bytes())?;
                }
            }
        }
        Ok(())
    }

    async fn read_info(&self, path: &str) -> Result<Option<IndexEntry>, StorageError> {
        match self.info.get(path.as_bytes())? {
            Some(bytes) => codec::decode_info(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn write_info(&self, entry: &IndexEntry) -> Result<(), StorageError> {
        let bytes = codec::encode_info(entry)?;
        self.info.insert(entry.path.as_bytes(), bytes)?;
        Ok(())
    }

    async fn list_files(
        &self,
        prefix: Option<&str>,
        segment: Option<Segment>,
        recursive: bool,
    ) -> Result<Vec<FileListing>, StorageError> {
        let tree = self.tree(segment.unwrap_or(Segment::Info));
        let scan_prefix = prefix.unwrap_or("").trim_matches('/');

        let mut paths = Vec::new();
        for item in tree.scan_prefix(scan_prefix.as_bytes()) {
            let (key, _) = item?;
            let path = Self::decode_key(&key)?;
            if matches_prefix(&path, prefix, recursive) {
                paths.push(path);
            }
        }

        let mut listings = Vec::with_capacity(paths.len());
        for path in paths {
            let info = self.read_info(&path).await?;
            listings.push(FileListing { path, info });
        }
        Ok(listings)
    }
}
