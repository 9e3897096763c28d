// rust/irrigation-core/src/dataset/iterator.rs

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{IrsConfig, IteratorSettings, MissingSource};
use crate::error::{IrrigationError, Result};
use crate::storage::StorageBackend;

use super::assembler::WindowedBatchAssembler;
use super::cursor::{CursorTracker, IteratorState};
use super::normalize::{strategy_from_config, NormalizationRange, NormalizationStrategy, PerBatchRefit};
use super::params::{Adjustment, IteratorParams};
use super::source::{CsvRecordSource, EmptySource, RecordSource, SourceOptions};
use super::tensor::Minibatch;

/// Everything needed to resume an iterator at the same position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorSnapshot {
    pub cursor_offset: u64,
    pub batch_index: u64,
    pub columns: usize,
    pub batch_size: usize,
    pub window_length: usize,
    pub file_records: u64,
    pub source_fingerprint: u64,
}

/// A windowed minibatch iterator over a record source.
///
/// Each call to [`next_batch`](Self::next_batch) checks that a whole batch
/// remains past the cursor, repositions the source to the cursor, assembles
/// `batch_size * window` rows, normalizes the inputs and advances the cursor.
///
/// The iterator owns its source and is `Send`, but has no internal locking:
/// it must be driven from one thread at a time. See
/// [`PrefetchingIterator`](super::PrefetchingIterator) for a background
/// producer.
pub struct WindowedIterator {
    source: Box<dyn RecordSource>,
    params: IteratorParams,
    assembler: WindowedBatchAssembler,
    normalizer: Box<dyn NormalizationStrategy>,
    cursor: CursorTracker,
    batch_index: u64,
    adjustments: Vec<Adjustment>,
}

impl WindowedIterator {
    /// Opens the data file at `path` and builds an iterator from `config`.
    ///
    /// # Errors
    ///
    /// `SourceUnavailable` if the file cannot be opened, unless
    /// `source.on_missing` is `degrade`, in which case the iterator is empty.
    /// `Config` for shape values rejected by the validation policy.
    pub fn open(storage: &dyn StorageBackend, path: &Path, config: &IrsConfig) -> Result<Self> {
        let options = SourceOptions::from(&config.source);

        let mut source: Box<dyn RecordSource> = match CsvRecordSource::open(storage, path, options) {
            Ok(source) => Box::new(source),
            Err(e @ IrrigationError::SourceUnavailable { .. })
                if config.source.on_missing == MissingSource::Degrade =>
            {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "data file unavailable, continuing with an empty dataset"
                );
                Box::new(EmptySource::new(path))
            }
            Err(e) => return Err(e),
        };

        let resolved = IteratorParams::resolve(&config.iterator, source.file_records())?;
        let normalizer = strategy_from_config(&config.normalization, &resolved.params, &mut *source)?;

        Ok(Self::build(source, resolved.params, resolved.adjustments, normalizer))
    }

    /// Builds an iterator over an already opened source, normalizing with a
    /// per-batch refit into the default range.
    pub fn from_source(source: Box<dyn RecordSource>, settings: &IteratorSettings) -> Result<Self> {
        let resolved = IteratorParams::resolve(settings, source.file_records())?;
        let normalizer = Box::new(PerBatchRefit::new(
            NormalizationRange::default(),
            resolved.params.feature_count(),
        ));

        Ok(Self::build(source, resolved.params, resolved.adjustments, normalizer))
    }

    fn build(
        source: Box<dyn RecordSource>,
        params: IteratorParams,
        adjustments: Vec<Adjustment>,
        normalizer: Box<dyn NormalizationStrategy>,
    ) -> Self {
        let cursor = CursorTracker::new(
            source.file_records(),
            params.batch_size as u64,
            params.window_length as u64,
        );

        tracing::info!(
            source = %source.name(),
            file_records = source.file_records(),
            columns = params.columns,
            batch_size = params.batch_size,
            window_length = params.window_length,
            normalization = normalizer.name(),
            "windowed iterator ready"
        );

        Self {
            source,
            assembler: WindowedBatchAssembler::new(params),
            params,
            normalizer,
            cursor,
            batch_index: 0,
            adjustments,
        }
    }

    /// Replaces the normalization strategy.
    pub fn with_normalizer(mut self, normalizer: Box<dyn NormalizationStrategy>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// True while at least `batch_size * window` records remain past the cursor.
    pub fn has_next(&self) -> bool {
        self.cursor.has_next()
    }

    /// Produces the next batch of `batch_size` examples.
    ///
    /// Returns `Ok(None)` once fewer than a whole batch of records remain.
    pub fn next_batch(&mut self) -> Result<Option<Minibatch>> {
        self.next_n(self.params.batch_size)
    }

    /// Produces a batch of `n` examples.
    ///
    /// Readiness is judged against the configured batch size, so `n` larger
    /// than it can fail with `InsufficientData` near the end of the file.
    pub fn next_n(&mut self, n: usize) -> Result<Option<Minibatch>> {
        if n == 0 {
            return Err(IrrigationError::config("batch request of 0 examples"));
        }
        if !self.has_next() {
            return Ok(None);
        }

        let offset = self.cursor.offset();
        if self.source.position() != offset {
            self.source.seek_record(offset)?;
        }

        let mut batch = self
            .assembler
            .assemble(&mut *self.source, n, self.batch_index)?;
        self.normalizer.normalize(&mut batch)?;

        self.cursor.advance(self.params.span(n));
        self.batch_index += 1;

        tracing::debug!(
            offset,
            batch_index = batch.batch_index,
            examples = n,
            cursor_offset = self.cursor.offset(),
            "minibatch assembled"
        );

        Ok(Some(batch))
    }

    /// Assembles one normalized example from the last `window` records of
    /// the file, leaving the cursor where it is.
    ///
    /// Returns `Ok(None)` if the file holds fewer than `window` records.
    pub fn last_window(&mut self) -> Result<Option<Minibatch>> {
        let window = self.params.window_length as u64;
        let records = self.source.file_records();
        if records < window {
            return Ok(None);
        }

        self.source.seek_record(records - window)?;
        let mut batch = self
            .assembler
            .assemble(&mut *self.source, 1, self.batch_index)?;
        self.normalizer.normalize(&mut batch)?;
        Ok(Some(batch))
    }

    /// Moves the cursor back to the start and rewinds the source.
    ///
    /// The cursor lands on record 1, not 0; see
    /// [`RESET_OFFSET`](super::cursor::RESET_OFFSET).
    pub fn reset(&mut self) -> Result<()> {
        self.cursor.reset();
        self.batch_index = 0;
        self.source.rewind()?;
        tracing::debug!(cursor_offset = self.cursor.offset(), "iterator reset");
        Ok(())
    }

    /// Moves the cursor to an absolute record offset.
    pub fn scan_to(&mut self, offset: u64) -> Result<()> {
        self.source.seek_record(offset)?;
        self.cursor.reposition(offset);
        Ok(())
    }

    /// Index of the batch under the cursor.
    pub fn cursor(&self) -> u64 {
        self.cursor.batch_index()
    }

    pub fn cursor_offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Whole batches the file holds.
    pub fn total_examples(&self) -> u64 {
        self.cursor.total_examples()
    }

    /// Time steps per example, the window length.
    pub fn num_examples(&self) -> usize {
        self.params.window_length
    }

    pub fn file_records(&self) -> u64 {
        self.source.file_records()
    }

    pub fn columns(&self) -> usize {
        self.params.columns
    }

    pub fn feature_count(&self) -> usize {
        self.params.feature_count()
    }

    /// Label columns per row.
    pub fn total_outcomes(&self) -> usize {
        1
    }

    pub fn batch(&self) -> usize {
        self.params.batch_size
    }

    pub fn window_length(&self) -> usize {
        self.params.window_length
    }

    pub fn params(&self) -> &IteratorParams {
        &self.params
    }

    pub fn reset_supported(&self) -> bool {
        true
    }

    /// The iterator may be moved to another thread and driven there.
    pub fn async_supported(&self) -> bool {
        true
    }

    pub fn state(&self) -> IteratorState {
        self.cursor.state()
    }

    /// Parameter values replaced during construction.
    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    pub fn source_name(&self) -> String {
        self.source.name()
    }

    pub fn snapshot(&self) -> IteratorSnapshot {
        IteratorSnapshot {
            cursor_offset: self.cursor.offset(),
            batch_index: self.batch_index,
            columns: self.params.columns,
            batch_size: self.params.batch_size,
            window_length: self.params.window_length,
            file_records: self.source.file_records(),
            source_fingerprint: self.source.fingerprint(),
        }
    }

    /// Moves to the position recorded in `snapshot`.
    ///
    /// # Errors
    ///
    /// `Checkpoint` if the snapshot was taken over a different file or with
    /// a different shape.
    pub fn restore(&mut self, snapshot: &IteratorSnapshot) -> Result<()> {
        if snapshot.source_fingerprint != self.source.fingerprint()
            || snapshot.file_records != self.source.file_records()
        {
            return Err(IrrigationError::checkpoint(format!(
                "checkpoint was taken over a different data file than '{}'",
                self.source.name()
            )));
        }

        let shape = (snapshot.columns, snapshot.batch_size, snapshot.window_length);
        let ours = (self.params.columns, self.params.batch_size, self.params.window_length);
        if shape != ours {
            return Err(IrrigationError::checkpoint(format!(
                "checkpoint shape (columns, batch, window) {shape:?} does not match {ours:?}"
            )));
        }

        self.scan_to(snapshot.cursor_offset)?;
        self.batch_index = snapshot.batch_index;

        tracing::info!(
            cursor_offset = snapshot.cursor_offset,
            batch_index = snapshot.batch_index,
            "iterator restored"
        );
        Ok(())
    }
}

impl Iterator for WindowedIterator {
    type Item = Result<Minibatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
