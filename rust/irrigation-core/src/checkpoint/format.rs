// rust/irrigation-core/src/checkpoint/format.rs

//! Cursor checkpoint file format.
//!
//! ```text
//! +-------------------------+
//! | Header Length (4 bytes) |  <- u32 little-endian
//! +-------------------------+
//! | Header (bincode)        |  <- CheckpointHeader
//! +-------------------------+
//! | Payload (bincode)       |  <- IteratorSnapshot
//! +-------------------------+
//! ```

use serde::{Deserialize, Serialize};

/// Header for a cursor checkpoint file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointHeader {
    /// Magic bytes identifying this as a cursor checkpoint ("IRSC")
    pub magic: [u8; 4],
    /// Format version number
    pub version: u32,
    /// Length of the payload in bytes
    pub payload_len: u64,
    /// XXHash64 checksum of the payload
    pub checksum: u64,
    /// Milliseconds since the Unix epoch when the checkpoint was taken
    pub created_at_ms: u64,
}

impl CheckpointHeader {
    pub const MAGIC: [u8; 4] = *b"IRSC";

    pub const VERSION: u32 = 1;

    pub fn new(payload_len: u64, checksum: u64, created_at_ms: u64) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            payload_len,
            checksum,
            created_at_ms,
        }
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == Self::MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == Self::VERSION
    }
}

/// XXHash64 with seed 0, used for payload checksums.
pub(crate) fn checksum(data: &[u8]) -> u64 {
    use std::hash::Hasher;
    let mut hasher = twox_hash::XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}
