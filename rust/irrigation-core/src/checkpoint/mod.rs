// rust/irrigation-core/src/checkpoint/mod.rs

//! Cursor checkpoints: persist an iterator's position so a training pass can
//! resume in another process.
//!
//! - Payload is an [`IteratorSnapshot`](crate::dataset::IteratorSnapshot)
//! - Integrity verification via XXHash64 checksums
//! - Atomic writes to prevent partial checkpoints
//! - Automatic cleanup of old checkpoints
//!
//! # Example
//!
//! ```no_run
//! use irrigation_core::checkpoint::{CheckpointReader, CheckpointWriter};
//! use irrigation_core::config::{CheckpointConfig, IrsConfig, StorageConfig};
//! use irrigation_core::dataset::WindowedIterator;
//! use irrigation_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn example() -> irrigation_core::Result<()> {
//! let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&StorageConfig::default())?);
//! let config = IrsConfig::default();
//! let mut iter = WindowedIterator::open(&*storage, Path::new("field.csv"), &config)?;
//! iter.next_batch()?;
//!
//! let writer = CheckpointWriter::new(storage.clone(), CheckpointConfig::default());
//! let path = writer.write("field", &iter.snapshot())?;
//!
//! let reader = CheckpointReader::new(storage);
//! iter.restore(&reader.read(&path)?)?;
//! # Ok(())
//! # }
//! ```

mod format;
mod reader;
mod writer;

pub use format::CheckpointHeader;
pub use reader::CheckpointReader;
pub use writer::{CheckpointWriter, CHECKPOINT_EXTENSION};
