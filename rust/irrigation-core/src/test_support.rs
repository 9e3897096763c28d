// rust/irrigation-core/src/test_support.rs

//! In-memory storage and fixture builders shared by the unit tests.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{IrrigationError, Result};
use crate::storage::{StorageBackend, StorageReader, StorageWriter};

use crate::dataset::{CsvRecordSource, SourceOptions};

pub struct MemoryReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageReader for MemoryReader {
    fn size(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let data = self.cursor.get_ref();
        let start = (start as usize).min(data.len());
        let end = start.saturating_add(length).min(data.len());
        Ok(data[start..end].to_vec())
    }
}

struct MemoryWriter {
    path: PathBuf,
    data: Vec<u8>,
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageWriter for MemoryWriter {
    fn finish(self: Box<Self>) -> Result<()> {
        let MemoryWriter { path, data, files } = *self;
        files.lock().unwrap().insert(path, data);
        Ok(())
    }
}

/// Storage backend over a map of paths to bytes. Writes become visible on
/// `finish`.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.into(), data.into());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }
}

impl StorageBackend for MemoryStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| IrrigationError::storage(path, "not found"))?;
        Ok(Box::new(MemoryReader::new(data)))
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            data: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    fn list(&self, prefix: &Path) -> Result<Vec<String>> {
        let files = self.files.lock().unwrap();
        let mut names: Vec<String> = files
            .keys()
            .filter(|path| path.parent() == Some(prefix))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let data = files
            .remove(from)
            .ok_or_else(|| IrrigationError::storage(from, "not found"))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

pub fn memory_source(text: &str) -> CsvRecordSource {
    memory_source_with(text, SourceOptions::default())
}

pub fn memory_source_with(text: &str, options: SourceOptions) -> CsvRecordSource {
    let reader = Box::new(MemoryReader::new(text.as_bytes().to_vec()));
    CsvRecordSource::from_reader(reader, "memory.csv", options).unwrap()
}

/// A file with a header and `rows` data rows of `columns` numeric cells.
///
/// Row `r` holds `r * 10 + c` in numeric column `c`, so every value in a
/// batch can be traced back to its row and column.
pub fn numbered_csv(rows: usize, columns: usize) -> String {
    let mut text = String::from("date");
    for c in 0..columns {
        text.push_str(&format!(",c{c}"));
    }
    text.push('\n');

    for r in 0..rows {
        text.push_str(&format!("day{r}"));
        for c in 0..columns {
            text.push_str(&format!(",{}", r * 10 + c));
        }
        text.push('\n');
    }
    text
}
