// rust/irrigation-core/src/dataset/source.rs

//! Sequential, resettable access to the rows of a delimited data file.

use std::hash::Hasher;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, Position, ReaderBuilder, Trim};
use twox_hash::XxHash64;

use crate::config::{ScanMode, SourceConfig};
use crate::error::{IrrigationError, Result};
use crate::storage::{StorageBackend, StorageReader};

use super::record::RawRecord;

/// Bytes from the start of the file that feed the source fingerprint.
const FINGERPRINT_PREFIX: usize = 4 * 1024;

/// A file-backed provider of raw rows.
///
/// The record count is fixed when the source is opened. Positions are data
/// row offsets: 0 is the first row after the header.
pub trait RecordSource: Send {
    /// Number of data rows, header excluded.
    fn file_records(&self) -> u64;

    /// Offset of the next row `next_record` would return.
    fn position(&self) -> u64;

    fn has_more(&self) -> bool {
        self.position() < self.file_records()
    }

    /// Reads and splits the next row.
    ///
    /// # Errors
    ///
    /// Fails when called past the last row or when the read fails.
    fn next_record(&mut self) -> Result<RawRecord>;

    /// Reads past the next row without splitting it.
    fn skip_record(&mut self) -> Result<()>;

    /// Returns to the first data row.
    fn rewind(&mut self) -> Result<()>;

    /// Moves so that the next row read is the one at `offset`.
    ///
    /// The default rewinds and discards rows one by one. An offset past the
    /// last row leaves the source exhausted.
    fn seek_record(&mut self, offset: u64) -> Result<()> {
        self.rewind()?;
        while self.position() < offset && self.has_more() {
            self.skip_record()?;
        }
        Ok(())
    }

    /// Hash identifying the file contents, used to match cursor checkpoints
    /// to the file they were taken from.
    fn fingerprint(&self) -> u64;

    /// Human-readable name for log lines.
    fn name(&self) -> String;
}

/// How a [`CsvRecordSource`] splits and skips rows.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub delimiter: char,
    pub header_rows: usize,
    pub scan_mode: ScanMode,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            header_rows: 1,
            scan_mode: ScanMode::Linear,
        }
    }
}

impl From<&SourceConfig> for SourceOptions {
    fn from(config: &SourceConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            header_rows: config.header_rows,
            scan_mode: config.scan_mode,
        }
    }
}

/// Delimited text file source.
///
/// Rows are read with the `csv` crate: quoted cells may hold the delimiter
/// or line breaks, surrounding whitespace is trimmed and blank lines are
/// skipped. Opening the source performs one full pass over the file to count
/// data rows. In [`ScanMode::Indexed`] the same pass records the position of
/// every data row so that `seek_record` is a single seek instead of a rescan.
pub struct CsvRecordSource {
    reader: csv::Reader<Box<dyn StorageReader>>,
    path: PathBuf,
    options: SourceOptions,
    file_records: u64,
    /// Position of the first data row.
    data_start: Position,
    /// Position just past the last row.
    end: Position,
    position: u64,
    row_offsets: Option<Vec<Position>>,
    fingerprint: u64,
    row: ByteRecord,
}

impl CsvRecordSource {
    /// Opens `path` through `storage` and counts its rows.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` if the file cannot be opened or read.
    pub fn open(storage: &dyn StorageBackend, path: &Path, options: SourceOptions) -> Result<Self> {
        let reader = storage.open_read(path).map_err(|e| match e {
            IrrigationError::Storage {
                path,
                message,
                source,
            } => IrrigationError::source_unavailable(path, message, source),
            other => other,
        })?;

        Self::from_reader(reader, path, options)
    }

    /// Builds a source over an already opened reader.
    pub fn from_reader(
        reader: Box<dyn StorageReader>,
        path: impl Into<PathBuf>,
        options: SourceOptions,
    ) -> Result<Self> {
        let path = path.into();
        let delimiter = u8::try_from(options.delimiter)
            .ok()
            .filter(|b| b.is_ascii() && *b != b'"')
            .ok_or_else(|| {
                IrrigationError::config(format!(
                    "delimiter {:?} is not a single ASCII character",
                    options.delimiter
                ))
            })?;

        let mut reader = reader;
        let fingerprint = fingerprint_of(&mut *reader)?;

        let reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut source = Self {
            reader,
            path,
            options,
            file_records: 0,
            data_start: Position::new(),
            end: Position::new(),
            position: 0,
            row_offsets: None,
            fingerprint,
            row: ByteRecord::new(),
        };

        source.count_rows()?;
        source.rewind()?;

        tracing::info!(
            source = %source.path.display(),
            file_records = source.file_records,
            scan_mode = ?source.options.scan_mode,
            "record source opened"
        );

        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Full pass over the file: header rows, data row count and, when
    /// indexed, the start position of every data row.
    fn count_rows(&mut self) -> Result<()> {
        self.reader.seek(Position::new()).map_err(|e| {
            IrrigationError::source_unavailable(
                &self.path,
                "failed to rewind for row count",
                Some(e.into()),
            )
        })?;

        let indexed = self.options.scan_mode == ScanMode::Indexed;
        let mut offsets = Vec::new();
        let mut headers_left = self.options.header_rows;
        let mut records = 0u64;

        loop {
            let before = self.reader.position().clone();
            let more = self.reader.read_byte_record(&mut self.row).map_err(|e| {
                IrrigationError::source_unavailable(&self.path, "failed to read file", Some(e.into()))
            })?;
            if !more {
                break;
            }

            if headers_left > 0 {
                headers_left -= 1;
                self.data_start = self.reader.position().clone();
                continue;
            }
            if indexed {
                offsets.push(self.row.position().cloned().unwrap_or(before));
            }
            records += 1;
        }

        self.end = self.reader.position().clone();
        if headers_left > 0 {
            // Header only partly present: no data rows, data starts at EOF.
            self.data_start = self.end.clone();
        }

        self.file_records = records;
        self.row_offsets = indexed.then_some(offsets);
        Ok(())
    }

    fn seek_to(&mut self, pos: Position) -> Result<()> {
        let byte = pos.byte();
        self.reader.seek(pos).map_err(|e| {
            IrrigationError::storage_with_source(
                &self.path,
                format!("failed to seek to byte {byte}"),
                e.into(),
            )
        })
    }

    /// Reads the next row into `row` and returns its 1-based line number.
    fn read_row(&mut self) -> Result<u64> {
        let expected_line = self.options.header_rows as u64 + self.position + 1;

        if !self.has_more() {
            return Err(IrrigationError::storage(
                &self.path,
                format!("read past the last record (line {expected_line})"),
            ));
        }

        let more = self.reader.read_byte_record(&mut self.row).map_err(|e| {
            IrrigationError::storage_with_source(
                &self.path,
                format!("failed to read line {expected_line}"),
                e.into(),
            )
        })?;
        if !more {
            return Err(IrrigationError::storage(
                &self.path,
                format!("unexpected end of file at line {expected_line}"),
            ));
        }

        self.position += 1;
        Ok(self.row.position().map_or(expected_line, Position::line))
    }
}

impl RecordSource for CsvRecordSource {
    fn file_records(&self) -> u64 {
        self.file_records
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn next_record(&mut self) -> Result<RawRecord> {
        let line = self.read_row()?;
        Ok(RawRecord::from_byte_record(line, &self.row))
    }

    fn skip_record(&mut self) -> Result<()> {
        self.read_row().map(|_| ())
    }

    fn rewind(&mut self) -> Result<()> {
        self.seek_to(self.data_start.clone())?;
        self.position = 0;
        Ok(())
    }

    fn seek_record(&mut self, offset: u64) -> Result<()> {
        if self.row_offsets.is_none() {
            // Linear mode: rewind and scan.
            self.rewind()?;
            while self.position < offset && self.has_more() {
                self.skip_record()?;
            }
            return Ok(());
        }

        let target = self
            .row_offsets
            .as_ref()
            .and_then(|offsets| offsets.get(offset as usize).cloned());

        match target {
            Some(pos) => {
                self.seek_to(pos)?;
                self.position = offset;
            }
            None => {
                self.seek_to(self.end.clone())?;
                self.position = self.file_records;
            }
        }
        Ok(())
    }

    fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Stand-in for a data file that could not be opened, used when the
/// configuration asks for the legacy degrade behaviour. It has no rows, so
/// an iterator over it is exhausted from the start.
#[derive(Debug, Clone)]
pub struct EmptySource {
    path: PathBuf,
}

impl EmptySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for EmptySource {
    fn file_records(&self) -> u64 {
        0
    }

    fn position(&self) -> u64 {
        0
    }

    fn next_record(&mut self) -> Result<RawRecord> {
        Err(IrrigationError::storage(&self.path, "source is unavailable"))
    }

    fn skip_record(&mut self) -> Result<()> {
        Err(IrrigationError::storage(&self.path, "source is unavailable"))
    }

    fn rewind(&mut self) -> Result<()> {
        Ok(())
    }

    fn fingerprint(&self) -> u64 {
        0
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// XXHash64 over the file size and the first few kilobytes.
fn fingerprint_of(reader: &mut dyn StorageReader) -> Result<u64> {
    let size = reader.size();
    let prefix = reader.read_range(0, FINGERPRINT_PREFIX.min(size as usize))?;

    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&size.to_le_bytes());
    hasher.write(&prefix);
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_source, memory_source_with, MemoryReader};

    const FIELD: &str = "date,sms,rain,label\n\
                         2017-06-01,0.30,0.0,0.5\n\
                         2017-06-02,0.28,0.1,0.0\n\
                         2017-06-03,0.35,1.2,0.0\n";

    #[test]
    fn test_counts_rows_excluding_header() {
        let source = memory_source(FIELD);
        assert_eq!(source.file_records(), 3);
        assert_eq!(source.position(), 0);
        assert!(source.has_more());
    }

    #[test]
    fn test_counts_last_line_without_newline() {
        let source = memory_source("h\n1,2\n3,4");
        assert_eq!(source.file_records(), 2);
    }

    #[test]
    fn test_empty_and_header_only_files() {
        assert_eq!(memory_source("").file_records(), 0);
        assert_eq!(memory_source("date,sms,label\n").file_records(), 0);
        assert!(!memory_source("date,sms,label").has_more());
    }

    #[test]
    fn test_sequential_reads_and_line_numbers() {
        let mut source = memory_source(FIELD);

        let first = source.next_record().unwrap();
        assert_eq!(first.date(), Some("2017-06-01"));
        assert_eq!(first.line(), 2);

        source.skip_record().unwrap();
        let third = source.next_record().unwrap();
        assert_eq!(third.date(), Some("2017-06-03"));
        assert_eq!(third.line(), 4);

        assert!(!source.has_more());
        assert!(source.next_record().is_err());
    }

    #[test]
    fn test_rewind_returns_to_first_data_row() {
        let mut source = memory_source(FIELD);
        source.next_record().unwrap();
        source.next_record().unwrap();

        source.rewind().unwrap();
        assert_eq!(source.position(), 0);
        assert_eq!(source.next_record().unwrap().date(), Some("2017-06-01"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut source = memory_source("h,a,b\r\n2017-06-01,1,2\r\n2017-06-02,3,4\r\n");
        assert_eq!(source.file_records(), 2);
        let record = source.next_record().unwrap();
        assert_eq!(record.numeric(2).unwrap(), 2.0);
    }

    #[test]
    fn test_seek_linear_and_indexed_agree() {
        let text: String = std::iter::once("date,v,label\n".to_string())
            .chain((0..50).map(|i| format!("day{i},{i},{}\n", i % 3)))
            .collect();

        let mut linear = memory_source_with(&text, SourceOptions::default());
        let mut indexed = memory_source_with(
            &text,
            SourceOptions {
                scan_mode: ScanMode::Indexed,
                ..Default::default()
            },
        );

        for offset in [0u64, 1, 17, 49, 3] {
            linear.seek_record(offset).unwrap();
            indexed.seek_record(offset).unwrap();
            assert_eq!(linear.position(), offset);
            assert_eq!(indexed.position(), offset);
            assert_eq!(linear.next_record().unwrap(), indexed.next_record().unwrap());
        }

        linear.seek_record(80).unwrap();
        indexed.seek_record(80).unwrap();
        assert!(!linear.has_more());
        assert!(!indexed.has_more());
    }

    #[test]
    fn test_custom_delimiter_and_header_rows() {
        let options = SourceOptions {
            delimiter: ';',
            header_rows: 2,
            scan_mode: ScanMode::Linear,
        };
        let mut source = memory_source_with("title\ndate;v;label\nd1;1,5;0\n", options);
        assert_eq!(source.file_records(), 1);
        let record = source.next_record().unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.line(), 3);
    }

    #[test]
    fn test_quoted_cells_keep_delimiter() {
        let mut source = memory_source(
            "date,a,label\n\"Jun 1, 2017\",1,0\n\"Jun 2, 2017\", 2 ,1\n",
        );
        assert_eq!(source.file_records(), 2);

        let first = source.next_record().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first.date(), Some("Jun 1, 2017"));

        let second = source.next_record().unwrap();
        assert_eq!(second.numeric(1).unwrap(), 2.0);
        assert_eq!(second.line(), 3);
    }

    #[test]
    fn test_multiline_cell_in_both_scan_modes() {
        let text = "date,v,label\n\"Jun 1\n2017\",1,0\n2017-06-02,2,1\n\n2017-06-03,3,0\n";
        let mut linear = memory_source_with(text, SourceOptions::default());
        let mut indexed = memory_source_with(
            text,
            SourceOptions {
                scan_mode: ScanMode::Indexed,
                ..Default::default()
            },
        );
        assert_eq!(linear.file_records(), 3);
        assert_eq!(indexed.file_records(), 3);

        for offset in [2u64, 0, 1] {
            linear.seek_record(offset).unwrap();
            indexed.seek_record(offset).unwrap();
            assert_eq!(linear.next_record().unwrap(), indexed.next_record().unwrap());
        }

        indexed.seek_record(1).unwrap();
        assert_eq!(indexed.next_record().unwrap().date(), Some("2017-06-02"));
        indexed.seek_record(0).unwrap();
        assert_eq!(indexed.next_record().unwrap().date(), Some("Jun 1\n2017"));
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let reader = Box::new(MemoryReader::new(FIELD.as_bytes().to_vec()));
        let options = SourceOptions {
            delimiter: '§',
            ..Default::default()
        };
        let result = CsvRecordSource::from_reader(reader, "field.csv", options);
        assert!(matches!(result, Err(IrrigationError::Config { .. })));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = memory_source(FIELD);
        let b = memory_source(FIELD);
        let c = memory_source("date,sms,rain,label\n2017-06-01,0.30,0.0,0.6\n");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_open_missing_file_is_source_unavailable() {
        use crate::config::StorageConfig;
        use crate::storage::LocalStorage;

        let temp = tempfile::TempDir::new().unwrap();
        let storage = LocalStorage::new(&StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        let result = CsvRecordSource::open(&storage, Path::new("absent.csv"), SourceOptions::default());
        assert!(matches!(result, Err(IrrigationError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_from_reader_uses_given_name() {
        let reader = Box::new(MemoryReader::new(FIELD.as_bytes().to_vec()));
        let source = CsvRecordSource::from_reader(reader, "field-7.csv", SourceOptions::default()).unwrap();
        assert_eq!(source.name(), "field-7.csv");
        assert_eq!(source.path(), Path::new("field-7.csv"));
    }

    #[test]
    fn test_empty_source() {
        let mut source = EmptySource::new("missing.csv");
        assert_eq!(source.file_records(), 0);
        assert!(!source.has_more());
        assert!(source.rewind().is_ok());
        assert!(source.seek_record(10).is_ok());
        assert!(source.next_record().is_err());
    }
}
