// rust/irrigation-core/src/checkpoint/reader.rs

//! Cursor checkpoint reader.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dataset::IteratorSnapshot;
use crate::error::{IrrigationError, Result};
use crate::storage::StorageBackend;

use super::format::{checksum, CheckpointHeader};
use super::writer::checkpoints_named;

/// Reads and verifies cursor checkpoints.
pub struct CheckpointReader {
    storage: Arc<dyn StorageBackend>,
}

impl CheckpointReader {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Reads the snapshot stored at `path`, verifying its integrity.
    ///
    /// # Errors
    ///
    /// Returns a `Checkpoint` error if:
    /// - The file is truncated
    /// - The magic bytes or version are wrong
    /// - The checksum or payload length doesn't match
    pub fn read(&self, path: &Path) -> Result<IteratorSnapshot> {
        let mut reader = self.storage.open_read(path)?;
        let mut checkpoint_data = Vec::new();
        reader.read_to_end(&mut checkpoint_data).map_err(|e| {
            IrrigationError::checkpoint_with_source("failed to read checkpoint file", e)
        })?;

        let (header, payload) = split(&checkpoint_data)?;

        if !header.validate_magic() {
            return Err(IrrigationError::checkpoint(format!(
                "invalid magic bytes: expected {:?}, got {:?}",
                CheckpointHeader::MAGIC,
                header.magic
            )));
        }

        if !header.validate_version() {
            return Err(IrrigationError::checkpoint(format!(
                "unsupported version: expected {}, got {}",
                CheckpointHeader::VERSION,
                header.version
            )));
        }

        if payload.len() as u64 != header.payload_len {
            return Err(IrrigationError::checkpoint(format!(
                "size mismatch: expected {}, got {}",
                header.payload_len,
                payload.len()
            )));
        }

        let computed = checksum(payload);
        if computed != header.checksum {
            return Err(IrrigationError::checkpoint(format!(
                "checksum mismatch: expected {}, got {computed}",
                header.checksum
            )));
        }

        bincode::deserialize(payload).map_err(|e| {
            IrrigationError::checkpoint_with_source("failed to decode iterator snapshot", e)
        })
    }

    /// Path of the newest checkpoint for `name` in `dir`, if any.
    pub fn latest(&self, dir: &Path, name: &str) -> Result<Option<PathBuf>> {
        let mut names = checkpoints_named(&*self.storage, dir, name)?;
        names.sort();
        Ok(names.pop().map(|filename| dir.join(filename)))
    }
}

fn split(data: &[u8]) -> Result<(CheckpointHeader, &[u8])> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(IrrigationError::checkpoint("checkpoint file too small"));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;

    if rest.len() < header_len {
        return Err(IrrigationError::checkpoint(
            "checkpoint file truncated: header incomplete",
        ));
    }
    let (header_bytes, payload) = rest.split_at(header_len);

    let header: CheckpointHeader = bincode::deserialize(header_bytes).map_err(|e| {
        IrrigationError::checkpoint_with_source("failed to deserialize header", e)
    })?;

    Ok((header, payload))
}
