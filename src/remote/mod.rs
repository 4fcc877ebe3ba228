//! Remote adapter interface
//!
//! Concrete clients for the hosting platforms live outside this crate. They plug in through
//! [`RemoteRefs`] (ref resolution, snapshots, ref updates) plus exactly one commit flow:
//!
//! - [`ActionsCommitter`]: a single call commits a list of file actions.
//! - [`TreeCommitter`]: blobs, then a tree, then a commit.
//!
//! The flow is chosen once when the [`RemoteAdapter`] is built and never re-probed.

pub mod meta;

pub use meta::build_url;

use crate::error::AdapterError;
use crate::hash::blob_hash;
use crate::sync::Change;
use crate::types::Hash;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// On-demand content source for a snapshot
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch content for `paths`. Paths the remote cannot serve are simply absent.
    async fn fetch_content(
        &self,
        paths: &[String],
    ) -> Result<BTreeMap<String, Vec<u8>>, AdapterError>;
}

/// Content held in memory, as produced by a raw snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    files: BTreeMap<String, Vec<u8>>,
}

impl StaticContent {
    pub fn new(files: BTreeMap<String, Vec<u8>>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl ContentFetcher for StaticContent {
    async fn fetch_content(
        &self,
        paths: &[String],
    ) -> Result<BTreeMap<String, Vec<u8>>, AdapterError> {
        Ok(paths
            .iter()
            .filter_map(|p| self.files.get(p).map(|c| (p.clone(), c.clone())))
            .collect())
    }
}

/// Remote state at one concrete head: path → blob hash, content fetched lazily
#[derive(Clone)]
pub struct RemoteSnapshot {
    pub head_sha: Hash,
    pub remote_hashes: BTreeMap<String, Hash>,
    fetcher: Arc<dyn ContentFetcher>,
}

impl RemoteSnapshot {
    pub fn new(
        head_sha: impl Into<Hash>,
        remote_hashes: BTreeMap<String, Hash>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        Self {
            head_sha: head_sha.into(),
            remote_hashes,
            fetcher,
        }
    }

    /// Normalize a raw snapshot of full file contents; hashes are git blob hashes
    pub fn from_contents<I, P, C>(head_sha: impl Into<Hash>, files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        let files: BTreeMap<String, Vec<u8>> = files
            .into_iter()
            .map(|(p, c)| (p.into(), c.into()))
            .collect();
        let remote_hashes = files
            .iter()
            .map(|(p, c)| (p.clone(), blob_hash(c)))
            .collect();
        Self::new(head_sha, remote_hashes, Arc::new(StaticContent::new(files)))
    }

    pub async fn fetch_content(
        &self,
        paths: &[String],
    ) -> Result<BTreeMap<String, Vec<u8>>, AdapterError> {
        if paths.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.fetcher.fetch_content(paths).await
    }
}

impl fmt::Debug for RemoteSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSnapshot")
            .field("head_sha", &self.head_sha)
            .field("remote_hashes", &self.remote_hashes)
            .finish_non_exhaustive()
    }
}

/// Ref handling shared by both commit flows
#[async_trait]
pub trait RemoteRefs: Send + Sync {
    /// Resolve a symbolic ref (branch name) to a concrete head hash
    async fn resolve_ref(&self, reference: &str) -> Result<Hash, AdapterError>;

    async fn fetch_snapshot(&self, head: &Hash) -> Result<RemoteSnapshot, AdapterError>;

    /// Point `branch` at `commit_sha`
    async fn update_ref(&self, branch: &str, commit_sha: &Hash) -> Result<(), AdapterError>;
}

/// Single-call commit API
#[async_trait]
pub trait ActionsCommitter: Send + Sync {
    async fn create_commit_with_actions(
        &self,
        branch: &str,
        message: &str,
        changes: &[Change],
        parent_sha: &Hash,
    ) -> Result<Hash, AdapterError>;
}

/// One tree entry for the three-step flow; `blob_id: None` removes the path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub path: String,
    pub blob_id: Option<Hash>,
}

/// Blob → tree → commit API
#[async_trait]
pub trait TreeCommitter: Send + Sync {
    /// Upload content for every create/update; returns path → blob id
    async fn create_blobs(&self, changes: &[Change])
        -> Result<BTreeMap<String, Hash>, AdapterError>;

    async fn create_tree(
        &self,
        entries: &[TreeChange],
        base_tree: Option<&Hash>,
    ) -> Result<Hash, AdapterError>;

    async fn create_commit(
        &self,
        message: &str,
        parent_sha: &Hash,
        tree_id: &Hash,
    ) -> Result<Hash, AdapterError>;
}

/// Commit flow a remote supports
#[derive(Clone)]
pub enum CommitFlow {
    Actions(Arc<dyn ActionsCommitter>),
    ThreeStep(Arc<dyn TreeCommitter>),
}

impl CommitFlow {
    pub fn name(&self) -> &'static str {
        match self {
            CommitFlow::Actions(_) => "actions",
            CommitFlow::ThreeStep(_) => "three-step",
        }
    }
}

/// A configured remote: ref operations plus its commit flow
#[derive(Clone)]
pub struct RemoteAdapter {
    refs: Arc<dyn RemoteRefs>,
    flow: CommitFlow,
}

impl RemoteAdapter {
    pub fn new(refs: Arc<dyn RemoteRefs>, flow: CommitFlow) -> Self {
        Self { refs, flow }
    }

    /// Adapter for a remote with a single-call commit API
    pub fn with_actions<R>(remote: Arc<R>) -> Self
    where
        R: RemoteRefs + ActionsCommitter + 'static,
    {
        Self::new(remote.clone(), CommitFlow::Actions(remote))
    }

    /// Adapter for a remote committing through blobs and trees
    pub fn with_three_step<R>(remote: Arc<R>) -> Self
    where
        R: RemoteRefs + TreeCommitter + 'static,
    {
        Self::new(remote.clone(), CommitFlow::ThreeStep(remote))
    }

    pub fn refs(&self) -> &dyn RemoteRefs {
        self.refs.as_ref()
    }

    pub fn flow(&self) -> &CommitFlow {
        &self.flow
    }
}

impl fmt::Debug for RemoteAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAdapter")
            .field("flow", &self.flow.name())
            .finish_non_exhaustive()
    }
}
