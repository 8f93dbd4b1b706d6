//! Owner record codec for the information region.

use super::{DecodeError, RecordReader, write_utf};
use serde::Serialize;

/// Protocol version of the owner record. Independent of the state codec.
pub const OWNER_PROTOCOL_VERSION: u8 = 3;

/// Maximum number of characters kept for `pid` and `operation`.
pub const DESCRIPTION_CHAR_LIMIT: usize = 340;

/// Who holds the state lock, and what they are doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerInfo {
    /// Local port the holder listens on for lock requests, 0 if none.
    pub port: i32,

    /// Unique id of the holder's acquisition.
    pub lock_id: i64,

    /// Human-readable process identifier of the holder.
    pub pid: String,

    /// What the holder is doing (e.g. "building configuration cache").
    pub operation: String,
}

impl OwnerInfo {
    /// Build an owner record, truncating `pid` and `operation` to the character limit.
    pub fn new(port: i32, lock_id: i64, pid: &str, operation: &str) -> Self {
        Self {
            port,
            lock_id,
            pid: truncate_description(pid).to_string(),
            operation: truncate_description(operation).to_string(),
        }
    }
}

/// Encode an owner record. Never fails: oversized strings are truncated first.
pub fn encode_owner(info: &OwnerInfo) -> Vec<u8> {
    let pid = truncate_description(&info.pid);
    let operation = truncate_description(&info.operation);

    let mut out = Vec::with_capacity(1 + 4 + 8 + 4 + pid.len() + operation.len());
    out.push(OWNER_PROTOCOL_VERSION);
    out.extend_from_slice(&info.port.to_be_bytes());
    out.extend_from_slice(&info.lock_id.to_be_bytes());
    write_utf(&mut out, pid);
    write_utf(&mut out, operation);
    out
}

pub fn decode_owner(bytes: &[u8]) -> Result<OwnerInfo, DecodeError> {
    let mut reader = RecordReader::new(bytes);
    reader.version(OWNER_PROTOCOL_VERSION)?;
    Ok(OwnerInfo {
        port: reader.i32()?,
        lock_id: reader.i64()?,
        pid: reader.utf()?,
        operation: reader.utf()?,
    })
}

/// Keep the first [`DESCRIPTION_CHAR_LIMIT`] characters.
pub(crate) fn truncate_description(value: &str) -> &str {
    match value.char_indices().nth(DESCRIPTION_CHAR_LIMIT) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}
