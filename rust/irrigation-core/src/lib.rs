// rust/irrigation-core/src/lib.rs

//! Irrigation Recommendation System - Core Library
//!
//! This crate turns a table of daily soil-moisture-sensor and weather
//! readings into normalized, fixed-shape minibatches for a sequence model,
//! and produces next-day irrigation recommendations from the model's output.
//! It also provides the storage abstraction, configuration, cursor
//! checkpoints and the report writer around it.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::IrsConfig;
pub use error::{IrrigationError, Result};
pub use storage::{LocalStorage, StorageBackend, StorageReader, StorageWriter};

pub mod checkpoint;
pub use checkpoint::{CheckpointHeader, CheckpointReader, CheckpointWriter};

pub mod dataset;
pub use dataset::{
    IteratorSnapshot, IteratorState, Minibatch, NormalizationStrategy, PrefetchingIterator,
    RecordSource, Tensor3, WindowedIterator,
};

pub mod sensors;
pub use sensors::SensorDepths;

pub mod report;
pub use report::Recommendation;

pub mod model;
pub use model::SequenceModel;

pub mod advisor;
pub use advisor::{Advice, Advisor, TrainingSummary};

#[cfg(test)]
mod test_support;
