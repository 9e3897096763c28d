// rust/irrigation-core/src/checkpoint/writer.rs

//! Cursor checkpoint writer.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CheckpointConfig;
use crate::dataset::IteratorSnapshot;
use crate::error::{IrrigationError, Result};
use crate::storage::StorageBackend;

use super::format::{checksum, CheckpointHeader};

/// File extension of cursor checkpoints.
pub const CHECKPOINT_EXTENSION: &str = ".ckpt";

/// Writes iterator snapshots as checkpoint files.
///
/// Files are named `<name>_<timestamp>.ckpt`, written atomically when
/// configured, and only the newest `keep_last_n` per name are kept.
pub struct CheckpointWriter {
    storage: Arc<dyn StorageBackend>,
    config: CheckpointConfig,
}

impl CheckpointWriter {
    pub fn new(storage: Arc<dyn StorageBackend>, config: CheckpointConfig) -> Self {
        Self { storage, config }
    }

    /// Writes `snapshot` and returns the path of the new checkpoint.
    pub fn write(&self, name: &str, snapshot: &IteratorSnapshot) -> Result<PathBuf> {
        self.storage.create_dir_all(&self.config.checkpoint_dir)?;

        let payload = bincode::serialize(snapshot).map_err(|e| {
            IrrigationError::serialization(format!("failed to serialize iterator snapshot: {e}"))
        })?;

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let header = CheckpointHeader::new(
            payload.len() as u64,
            checksum(&payload),
            created_at.as_millis() as u64,
        );
        let header_bytes = bincode::serialize(&header).map_err(|e| {
            IrrigationError::checkpoint_with_source("failed to serialize header", e)
        })?;

        let header_len = header_bytes.len() as u32;
        let mut checkpoint_data = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        checkpoint_data.extend_from_slice(&header_len.to_le_bytes());
        checkpoint_data.extend_from_slice(&header_bytes);
        checkpoint_data.extend_from_slice(&payload);

        let filename = Self::filename(name, created_at.as_nanos());
        let final_path = self.config.checkpoint_dir.join(&filename);

        if self.config.atomic_writes {
            let temp_path = self.config.checkpoint_dir.join(format!(".{filename}.tmp"));
            self.write_to_path(&temp_path, &checkpoint_data)?;
            self.storage.rename(&temp_path, &final_path)?;
        } else {
            self.write_to_path(&final_path, &checkpoint_data)?;
        }

        tracing::info!(
            path = %final_path.display(),
            cursor_offset = snapshot.cursor_offset,
            batch_index = snapshot.batch_index,
            "cursor checkpoint written"
        );

        self.cleanup_old_checkpoints(name)?;

        Ok(final_path)
    }

    /// Zero-padded so that lexical order is chronological order.
    fn filename(name: &str, timestamp_nanos: u128) -> String {
        format!("{name}_{timestamp_nanos:024}{CHECKPOINT_EXTENSION}")
    }

    fn write_to_path(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut writer = self.storage.open_write(path)?;
        writer.write_all(data).map_err(|e| {
            IrrigationError::checkpoint_with_source("failed to write checkpoint data", e)
        })?;
        writer.finish()
    }

    /// Keeps only the most recent `keep_last_n` checkpoints for `name`.
    fn cleanup_old_checkpoints(&self, name: &str) -> Result<()> {
        let mut matching = checkpoints_named(&*self.storage, &self.config.checkpoint_dir, name)?;
        matching.sort();

        if matching.len() > self.config.keep_last_n {
            let to_delete = matching.len() - self.config.keep_last_n;
            for filename in matching.iter().take(to_delete) {
                let path = self.config.checkpoint_dir.join(filename);
                tracing::debug!(path = %path.display(), "removing old checkpoint");
                self.storage.delete(&path)?;
            }
        }

        Ok(())
    }
}

/// File names of the finished checkpoints for `name` in `dir`.
pub(crate) fn checkpoints_named(
    storage: &dyn StorageBackend,
    dir: &Path,
    name: &str,
) -> Result<Vec<String>> {
    let prefix = format!("{name}_");
    Ok(storage
        .list(dir)?
        .into_iter()
        .filter(|e| e.starts_with(&prefix) && e.ends_with(CHECKPOINT_EXTENSION))
        .filter(|e| {
            // Reject names that merely share a prefix, e.g. "field" vs "field_b".
            let stamp = &e[prefix.len()..e.len() - CHECKPOINT_EXTENSION.len()];
            !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn snapshot() -> IteratorSnapshot {
        IteratorSnapshot {
            cursor_offset: 20,
            batch_index: 2,
            columns: 7,
            batch_size: 2,
            window_length: 5,
            file_records: 60,
            source_fingerprint: 0xfeed,
        }
    }

    fn create_test_writer(keep_last_n: usize, atomic_writes: bool) -> (CheckpointWriter, Arc<dyn StorageBackend>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage_config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&storage_config).unwrap());

        let config = CheckpointConfig {
            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_last_n,
            atomic_writes,
        };
        (CheckpointWriter::new(storage.clone(), config), storage, temp_dir)
    }

    #[test]
    fn test_write_creates_file() {
        let (writer, storage, _temp) = create_test_writer(3, true);
        let path = writer.write("field", &snapshot()).unwrap();
        assert!(storage.exists(&path).unwrap());
        assert!(path.starts_with("checkpoints"));
    }

    #[test]
    fn test_filename_sorts_chronologically() {
        let early = CheckpointWriter::filename("field", 999);
        let late = CheckpointWriter::filename("field", 1_000);
        assert!(early.starts_with("field_"));
        assert!(early.ends_with(".ckpt"));
        assert!(early < late);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let (writer, storage, _temp) = create_test_writer(3, true);
        let path = writer.write("atomic", &snapshot()).unwrap();

        let temp_path = path.with_file_name(format!(
            ".{}.tmp",
            path.file_name().unwrap().to_str().unwrap()
        ));
        assert!(!storage.exists(&temp_path).unwrap());
    }

    #[test]
    fn test_cleanup_keeps_last_n() {
        let (writer, storage, _temp) = create_test_writer(2, false);

        for _ in 0..4 {
            writer.write("field", &snapshot()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        writer.write("other", &snapshot()).unwrap();

        let entries = storage.list(Path::new("checkpoints")).unwrap();
        let field_count = entries.iter().filter(|e| e.starts_with("field_")).count();
        assert_eq!(field_count, 2);
        assert!(entries.iter().any(|e| e.starts_with("other_")));
    }

    #[test]
    fn test_checkpoints_named_ignores_similar_names() {
        let (writer, storage, _temp) = create_test_writer(5, true);
        writer.write("field", &snapshot()).unwrap();
        writer.write("field_b", &snapshot()).unwrap();

        let names = checkpoints_named(&*storage, Path::new("checkpoints"), "field").unwrap();
        assert_eq!(names.len(), 1);
    }
}
