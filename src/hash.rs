//! Content addressing
//!
//! Two SHA-1 flavors are computed for file content:
//!
//! - `content_hash`: digest over the raw bytes, used for local identity of change payloads
//!   and to recognise base records written before blob framing was adopted.
//! - `blob_hash`: digest over `"blob {len}\0" || bytes`, the git object id of the content.
//!   Remote platforms report these ids, so local content compares against them directly.
//!
//! Idempotency keys use BLAKE3 over arbitrary bytes.

use crate::types::Hash;
use sha1::{Digest, Sha1};

/// Compute the plain content hash of `content`
pub fn content_hash(content: &[u8]) -> Hash {
    let mut hasher = Sha1::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compute the git blob object id of `content`
///
/// blob_hash = sha1("blob " || decimal_len || "\0" || content)
pub fn blob_hash(content: &[u8]) -> Hash {
    let mut hasher = Sha1::new();
    hasher.update(b"blob ");
    hasher.update(content.len().to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compute a generic hex digest of arbitrary data
pub fn compute_hash(data: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}
