// rust/irrigation-core/src/dataset/cursor.rs

//! Cursor arithmetic for the windowed iterator.
//!
//! The cursor counts records, not batches: each batch consumes
//! `batch_size * window` rows, and the iterator stays live while that many
//! rows remain past the cursor.

use serde::{Deserialize, Serialize};

/// Offset the cursor returns to on `reset`.
///
/// Offsets are 0-based data row indices. A fresh iterator starts at 0 but a
/// reset lands on 1, so the first data row is only read on the first pass
/// and every pass after a reset starts at the second row. A 1-based line
/// counter, where position 1 means "skip nothing", would instead re-read the
/// first row after a reset; this cursor does not. Kept for compatibility
/// with existing training runs.
pub const RESET_OFFSET: u64 = 1;

/// Lifecycle of an iterator as seen through its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IteratorState {
    /// Nothing consumed since construction or the last reset.
    Ready,
    /// At least one batch produced and more remain.
    Iterating,
    /// Fewer than one batch worth of records remain.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorTracker {
    offset: u64,
    file_records: u64,
    batch_size: u64,
    window: u64,
    consumed: bool,
}

impl CursorTracker {
    pub fn new(file_records: u64, batch_size: u64, window: u64) -> Self {
        Self {
            offset: 0,
            file_records,
            batch_size,
            window,
            consumed: false,
        }
    }

    /// Records consumed by one batch.
    pub fn batch_span(&self) -> u64 {
        self.batch_size.saturating_mul(self.window)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn file_records(&self) -> u64 {
        self.file_records
    }

    /// True while a whole batch fits between the cursor and the end of file.
    pub fn has_next(&self) -> bool {
        self.offset.saturating_add(self.batch_span()) <= self.file_records
    }

    /// Index of the batch the cursor sits on.
    pub fn batch_index(&self) -> u64 {
        match self.batch_span() {
            0 => 0,
            span => self.offset / span,
        }
    }

    /// Number of whole batches the file holds.
    pub fn total_examples(&self) -> u64 {
        match self.batch_span() {
            0 => 0,
            span => self.file_records / span,
        }
    }

    pub fn advance(&mut self, records: u64) {
        self.offset = self.offset.saturating_add(records);
        self.consumed = true;
    }

    pub fn reset(&mut self) {
        self.offset = RESET_OFFSET;
        self.consumed = false;
    }

    /// Moves the cursor to an absolute record offset.
    pub fn reposition(&mut self, offset: u64) {
        self.offset = offset;
        self.consumed = offset > 0;
    }

    pub fn state(&self) -> IteratorState {
        if !self.has_next() {
            IteratorState::Exhausted
        } else if !self.consumed {
            IteratorState::Ready
        } else {
            IteratorState::Iterating
        }
    }
}
