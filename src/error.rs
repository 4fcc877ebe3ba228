//! Error types for the apigit replica engine.

use crate::types::Hash;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Errors reported by a remote adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Remote request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Remote request failed: {0}")]
    Request(String),

    #[error("Operation not supported by this remote: {0}")]
    Unsupported(String),
}

impl AdapterError {
    /// True when the remote rejected a ref update because it was not a fast-forward.
    pub fn is_non_fast_forward(&self) -> bool {
        let message = match self {
            AdapterError::Http { status: 422, .. } => return true,
            AdapterError::Http { message, .. } => message,
            AdapterError::Request(message) => message,
            AdapterError::Unsupported(_) => return false,
        };
        let lowered = message.to_lowercase();
        lowered.contains("fast forward") || lowered.contains("fast-forward")
    }
}

/// Errors surfaced by replica operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Push parent {actual} does not match replica head {expected}; pull first")]
    Concurrency { expected: Hash, actual: Hash },

    #[error("Incompatible update: remote rejected ref update to {commit_sha}; pull required")]
    NonFastForward { commit_sha: Hash },

    #[error("Nothing to push: change set is empty")]
    NoChanges,

    #[error("No branch configured for this replica")]
    NoBranch,

    #[error("No remote adapter configured for this replica")]
    NoAdapter,

    #[error("Path is in conflict, resolve it first: {0}")]
    Conflicted(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Remote adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}
