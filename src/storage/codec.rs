//! Versioned record encoding for disk backends
//!
//! Layout: 4-byte little-endian version, then the bincode payload.

use crate::error::StorageError;
use crate::index::{IndexEntry, IndexFile};
use serde::de::DeserializeOwned;
use serde::Serialize;

const INDEX_VERSION_V1: u32 = 1;
const INFO_VERSION_V1: u32 = 1;

pub fn encode_index(index: &IndexFile) -> Result<Vec<u8>, StorageError> {
    encode(INDEX_VERSION_V1, index)
}

pub fn decode_index(bytes: &[u8]) -> Result<IndexFile, StorageError> {
    decode(INDEX_VERSION_V1, bytes, "index")
}

pub fn encode_info(entry: &IndexEntry) -> Result<Vec<u8>, StorageError> {
    encode(INFO_VERSION_V1, entry)
}

pub fn decode_info(bytes: &[u8]) -> Result<IndexEntry, StorageError> {
    decode(INFO_VERSION_V1, bytes, "info record")
}

fn encode<T: Serialize>(version: u32, value: &T) -> Result<Vec<u8>, StorageError> {
    let payload = bincode::serialize(value)
        .map_err(|e| StorageError::Serialization(format!("Failed to encode record: {}", e)))?;
    let mut serialized = Vec::with_capacity(4 + payload.len());
    serialized.extend_from_slice(&version.to_le_bytes());
    serialized.extend_from_slice(&payload);
    Ok(serialized)
}

fn decode<T: DeserializeOwned>(expected: u32, bytes: &[u8], what: &str) -> Result<T, StorageError> {
    if bytes.len() < 4 {
        return Err(StorageError::Serialization(format!("{} too short", what)));
    }
    let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if version != expected {
        return Err(StorageError::Serialization(format!(
            "Unsupported {} version: {}",
            what, version
        )));
    }
    bincode::deserialize(&bytes[4..])
        .map_err(|e| StorageError::Serialization(format!("Failed to decode {}: {}", what, e)))
}
