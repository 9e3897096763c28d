// rust/irrigation-core/src/dataset/mod.rs

//! Windowed time-series minibatches from a delimited data file.
//!
//! A [`RecordSource`] yields the rows of the file, a [`CursorTracker`] keeps
//! the record offset, the [`WindowedBatchAssembler`] shapes consecutive rows
//! into `(batch, features, window)` tensors and a [`NormalizationStrategy`]
//! rescales the inputs. [`WindowedIterator`] ties them together.
//!
//! # Example
//!
//! ```ignore
//! use irrigation_core::config::IrsConfig;
//! use irrigation_core::dataset::WindowedIterator;
//! use irrigation_core::storage::LocalStorage;
//! use std::path::Path;
//!
//! let config = IrsConfig::from_file("irs.toml")?.with_env_overrides();
//! let storage = LocalStorage::new(&config.storage)?;
//! let mut iter = WindowedIterator::open(&storage, Path::new("field.csv"), &config)?;
//!
//! while let Some(batch) = iter.next_batch()? {
//!     // batch.input: (batch, features, window), batch.labels: (batch, 1, window)
//! }
//! iter.reset()?;
//! ```

mod assembler;
mod cursor;
mod iterator;
mod normalize;
mod params;
mod prefetch;
mod record;
mod source;
mod tensor;

pub use assembler::WindowedBatchAssembler;
pub use cursor::{CursorTracker, IteratorState, RESET_OFFSET};
pub use iterator::{IteratorSnapshot, WindowedIterator};
pub use normalize::{
    strategy_from_config, GlobalFit, Identity, MinMaxScaler, NormalizationRange,
    NormalizationStrategy, PerBatchRefit,
};
pub use params::{Adjustment, IteratorParams, ResolvedParams, DEFAULT_BATCH_SIZE, DEFAULT_COLUMNS};
pub use prefetch::PrefetchingIterator;
pub use record::RawRecord;
pub use source::{CsvRecordSource, EmptySource, RecordSource, SourceOptions};
pub use tensor::{Minibatch, Tensor3};
