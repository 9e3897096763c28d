// rust/irrigation-core/src/storage/mod.rs

//! Storage abstraction for the irrigation recommendation system.
//!
//! The data file is read through a [`StorageReader`], which is `Read + Seek`
//! so that the record source can rewind and, in indexed mode, seek straight
//! to a row. Cursor checkpoints and reports are written through
//! [`StorageWriter`].
//!
//! # Example
//!
//! ```no_run
//! use irrigation_core::config::StorageConfig;
//! use irrigation_core::storage::{LocalStorage, StorageBackend};
//! use std::io::{Read, Write};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//!
//! let mut writer = storage.open_write(Path::new("notes.txt")).unwrap();
//! writer.write_all(b"irrigate field 3").unwrap();
//! writer.finish().unwrap();
//!
//! let mut reader = storage.open_read(Path::new("notes.txt")).unwrap();
//! let mut content = String::new();
//! reader.read_to_string(&mut content).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{StorageBackend, StorageReader, StorageWriter};
