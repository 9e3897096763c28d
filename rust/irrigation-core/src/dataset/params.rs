// rust/irrigation-core/src/dataset/params.rs

//! Validation of the iterator shape: column count, batch size and window.

use std::fmt;

use crate::config::{IteratorSettings, ValidationPolicy};
use crate::error::{IrrigationError, Result};

/// Column count used when the requested one is not positive.
pub const DEFAULT_COLUMNS: usize = 7;

/// Batch size used when the requested one is not positive.
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Validated iterator shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorParams {
    /// Numeric columns per row, label included, date excluded.
    pub columns: usize,
    pub batch_size: usize,
    pub window_length: usize,
}

/// A requested value that was replaced during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    ColumnsDefaulted { requested: i64, applied: usize },
    BatchSizeDefaulted { requested: i64, applied: usize },
    WindowClamped { requested: i64, applied: usize },
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnsDefaulted { requested, applied } => {
                write!(f, "columns {requested} is not positive, using {applied}")
            }
            Self::BatchSizeDefaulted { requested, applied } => {
                write!(f, "batch size {requested} is not positive, using {applied}")
            }
            Self::WindowClamped { requested, applied } => {
                write!(f, "window length {requested} is out of range, using {applied}")
            }
        }
    }
}

/// Parameters after validation together with what was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParams {
    pub params: IteratorParams,
    pub adjustments: Vec<Adjustment>,
}

impl IteratorParams {
    /// Validates the requested shape against a file of `file_records` rows.
    ///
    /// The window must satisfy `0 < window < file_records`. Under
    /// [`ValidationPolicy::Clamp`] a non-positive column count or batch size
    /// falls back to its default and an out-of-range window is clamped to
    /// `file_records - 1` (at least 1). Under [`ValidationPolicy::Strict`]
    /// the first invalid value is an error.
    pub fn resolve(settings: &IteratorSettings, file_records: u64) -> Result<ResolvedParams> {
        let strict = settings.validation == ValidationPolicy::Strict;
        let mut adjustments = Vec::new();

        let columns = if settings.columns > 0 {
            settings.columns as usize
        } else if strict {
            return Err(IrrigationError::config(format!(
                "iterator.columns must be positive, got {}",
                settings.columns
            )));
        } else {
            adjustments.push(Adjustment::ColumnsDefaulted {
                requested: settings.columns,
                applied: DEFAULT_COLUMNS,
            });
            DEFAULT_COLUMNS
        };

        let batch_size = if settings.batch_size > 0 {
            settings.batch_size as usize
        } else if strict {
            return Err(IrrigationError::config(format!(
                "iterator.batch_size must be positive, got {}",
                settings.batch_size
            )));
        } else {
            adjustments.push(Adjustment::BatchSizeDefaulted {
                requested: settings.batch_size,
                applied: DEFAULT_BATCH_SIZE,
            });
            DEFAULT_BATCH_SIZE
        };

        let requested = settings.window_length;
        let window_length = if requested > 0 && (requested as u64) < file_records {
            requested as usize
        } else if strict {
            return Err(IrrigationError::config(format!(
                "iterator.window_length must be in 1..{file_records}, got {requested}"
            )));
        } else {
            let applied = file_records.saturating_sub(1).max(1) as usize;
            adjustments.push(Adjustment::WindowClamped { requested, applied });
            applied
        };

        for adjustment in &adjustments {
            tracing::warn!(%adjustment, "iterator parameter adjusted");
        }

        Ok(ResolvedParams {
            params: IteratorParams {
                columns,
                batch_size,
                window_length,
            },
            adjustments,
        })
    }

    /// Input features per row: every numeric column but the label.
    pub fn feature_count(&self) -> usize {
        self.columns - 1
    }

    /// Cells a row must have: the date plus every numeric column.
    pub fn row_width(&self) -> usize {
        self.columns + 1
    }

    /// Records consumed by `batches` examples.
    pub fn span(&self, batches: usize) -> u64 {
        (batches as u64).saturating_mul(self.window_length as u64)
    }
}
