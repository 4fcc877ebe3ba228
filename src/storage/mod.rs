//! Storage backend interface
//!
//! A backend holds the replica index plus, per path, up to three content segments and one
//! typed info record (the path's [`IndexEntry`]). Backends:
//! - In-memory maps ([`MemoryStorage`]), shared through an explicit [`MemoryRegistry`]
//! - sled on disk ([`SledStorage`])
//!
//! Any encoding of index and info records is private to the backend.

pub mod codec;
pub mod memory;
pub mod persistence;

pub use memory::{MemoryRegistry, MemoryStorage};
pub use persistence::SledStorage;

use crate::error::StorageError;
use crate::index::{IndexEntry, IndexFile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content channel for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    /// Uncommitted local edit
    Workspace,
    /// Last value reconciled with the remote
    Base,
    /// Remote value waiting for conflict resolution
    Conflict,
    /// The path's typed [`IndexEntry`] record
    Info,
}

impl Segment {
    /// Segments that hold file content
    pub const CONTENT: [Segment; 3] = [Segment::Workspace, Segment::Base, Segment::Conflict];

    pub const ALL: [Segment; 4] = [
        Segment::Workspace,
        Segment::Base,
        Segment::Conflict,
        Segment::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Workspace => "workspace",
            Segment::Base => "base",
            Segment::Conflict => "conflict",
            Segment::Info => "info",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segments a content read or write may address. `Info` is reached through
/// [`StorageBackend::read_info`]/[`StorageBackend::write_info`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlobSegment {
    Workspace,
    Base,
    Conflict,
}

impl From<BlobSegment> for Segment {
    fn from(segment: BlobSegment) -> Self {
        match segment {
            BlobSegment::Workspace => Segment::Workspace,
            BlobSegment::Base => Segment::Base,
            BlobSegment::Conflict => Segment::Conflict,
        }
    }
}

/// One listed path with its info record, when it has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    pub path: String,
    pub info: Option<IndexEntry>,
}

/// Storage backend trait
///
/// Implementations must be usable from a single replica at a time; they are not required
/// to order concurrent writes from several replicas.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Prepare the backend for use
    async fn init(&self) -> Result<(), StorageError>;

    /// Read the persisted index
    ///
    /// Returns `Ok(None)` when no index was written yet and `Err` when the stored index
    /// cannot be decoded.
    async fn read_index(&self) -> Result<Option<IndexFile>, StorageError>;

    async fn write_index(&self, index: &IndexFile) -> Result<(), StorageError>;

    /// Read content for `path`
    ///
    /// With `segment = None` the workspace segment is tried first, then base.
    async fn read_blob(
        &self,
        path: &str,
        segment: Option<BlobSegment>,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    async fn write_blob(
        &self,
        path: &str,
        content: &[u8],
        segment: BlobSegment,
    ) -> Result<(), StorageError>;

    /// Delete one segment for `path`, or every segment (info included) when `segment` is `None`
    async fn delete_blob(&self, path: &str, segment: Option<Segment>) -> Result<(), StorageError>;

    async fn read_info(&self, path: &str) -> Result<Option<IndexEntry>, StorageError>;

    async fn write_info(&self, entry: &IndexEntry) -> Result<(), StorageError>;

    /// List paths under `prefix`
    ///
    /// With `segment = None` every path holding an info record is listed; otherwise the paths
    /// present in that segment. Non-recursive listings stop at the first `/` below the prefix.
    async fn list_files(
        &self,
        prefix: Option<&str>,
        segment: Option<Segment>,
        recursive: bool,
    ) -> Result<Vec<FileListing>, StorageError>;
}

/// Whether `path` falls under `prefix` for a listing
pub(crate) fn matches_prefix(path: &str, prefix: Option<&str>, recursive: bool) -> bool {
    let prefix = prefix.unwrap_or("").trim_matches('/');
    let rest = if prefix.is_empty() {
        path
    } else {
        match path.strip_prefix(prefix) {
            Some(rest) if rest.starts_with('/') => &rest[1..],
            _ => return false,
        }
    };
    recursive || !rest.contains('/')
}
