//! Apigit: offline replica of a hosted git repository
//!
//! A replica keeps a local copy of one remote ref in a pluggable storage backend, tracks
//! local edits per path and reconciles them with the remote through explicit pull and push
//! operations. Divergence surfaces as conflicts for the caller to resolve.

pub mod config;
pub mod content;
pub mod error;
pub mod hash;
pub mod index;
pub mod logging;
pub mod remote;
pub mod replica;
pub mod storage;
pub mod sync;
pub mod types;

pub use error::{AdapterError, StorageError, SyncError};
pub use index::{AdapterMeta, EntryState, IndexEntry, IndexFile};
pub use remote::{RemoteAdapter, RemoteSnapshot};
pub use replica::Replica;
pub use sync::{Change, ConflictEntry, PullOutcome, PushInput, PushOutcome};
pub use types::{Hash, RemoteType};
