// rust/irrigation-core/src/dataset/normalize.rs

//! Rescaling of minibatch inputs into a fixed range.
//!
//! Labels are never touched. Statistics are kept per feature, over every
//! batch entry and time step.

use crate::config::{NormalizationConfig, NormalizationKind};
use crate::error::{IrrigationError, Result};

use super::params::IteratorParams;
use super::source::RecordSource;
use super::tensor::{Minibatch, Tensor3};

/// Target interval of the scaler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationRange {
    pub min: f32,
    pub max: f32,
}

impl Default for NormalizationRange {
    fn default() -> Self {
        Self {
            min: -10.0,
            max: 10.0,
        }
    }
}

impl NormalizationRange {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(IrrigationError::config(format!(
                "normalization range [{min}, {max}] is invalid"
            )));
        }
        Ok(Self { min, max })
    }
}

/// Per-feature min-max scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    range: NormalizationRange,
    data_min: Vec<f32>,
    data_max: Vec<f32>,
}

impl MinMaxScaler {
    pub fn new(range: NormalizationRange, features: usize) -> Self {
        Self {
            range,
            data_min: vec![f32::INFINITY; features],
            data_max: vec![f32::NEG_INFINITY; features],
        }
    }

    pub fn range(&self) -> NormalizationRange {
        self.range
    }

    pub fn is_fitted(&self) -> bool {
        self.data_min.iter().all(|v| v.is_finite())
    }

    /// Forgets all statistics.
    pub fn clear(&mut self) {
        self.data_min.fill(f32::INFINITY);
        self.data_max.fill(f32::NEG_INFINITY);
    }

    /// Folds one observation of feature `f` into the statistics.
    pub fn observe(&mut self, f: usize, value: f32) {
        if value < self.data_min[f] {
            self.data_min[f] = value;
        }
        if value > self.data_max[f] {
            self.data_max[f] = value;
        }
    }

    /// Fits from scratch on `input`.
    pub fn fit(&mut self, input: &Tensor3) {
        self.clear();
        for f in 0..self.data_min.len() {
            for value in input.feature_values(f) {
                self.observe(f, value);
            }
        }
    }

    /// Per-feature `(min, max)` seen so far.
    pub fn stats(&self) -> Vec<(f32, f32)> {
        self.data_min
            .iter()
            .copied()
            .zip(self.data_max.iter().copied())
            .collect()
    }

    /// Rescales `input` in place.
    ///
    /// A feature whose min equals its max maps to the lower bound of the range.
    pub fn transform(&self, input: &mut Tensor3) -> Result<()> {
        let features = input.shape()[1];
        if features != self.data_min.len() {
            return Err(IrrigationError::config(format!(
                "scaler fitted for {} features, batch has {features}",
                self.data_min.len()
            )));
        }
        if !self.is_fitted() {
            return Err(IrrigationError::config("scaler has not been fitted"));
        }

        let NormalizationRange { min: lo, max: hi } = self.range;
        for f in 0..features {
            let (min, max) = (self.data_min[f], self.data_max[f]);
            let spread = max - min;
            if spread > 0.0 {
                input.map_feature(f, |v| lo + (v - min) / spread * (hi - lo));
            } else {
                input.map_feature(f, |_| lo);
            }
        }
        Ok(())
    }
}

/// The normalization step applied to every assembled minibatch.
pub trait NormalizationStrategy: Send {
    fn normalize(&mut self, batch: &mut Minibatch) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Refits on each minibatch and applies to that same minibatch.
#[derive(Debug, Clone)]
pub struct PerBatchRefit {
    scaler: MinMaxScaler,
}

impl PerBatchRefit {
    pub fn new(range: NormalizationRange, features: usize) -> Self {
        Self {
            scaler: MinMaxScaler::new(range, features),
        }
    }

    /// Statistics of the last batch normalized.
    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }
}

impl NormalizationStrategy for PerBatchRefit {
    fn normalize(&mut self, batch: &mut Minibatch) -> Result<()> {
        if batch.input.is_empty() {
            return Ok(());
        }
        self.scaler.fit(&batch.input);
        self.scaler.transform(&mut batch.input)
    }

    fn name(&self) -> &'static str {
        "per_batch"
    }
}

/// Statistics fitted once and applied unchanged to every batch.
#[derive(Debug, Clone)]
pub struct GlobalFit {
    scaler: MinMaxScaler,
}

impl GlobalFit {
    pub fn from_scaler(scaler: MinMaxScaler) -> Self {
        Self { scaler }
    }

    /// Fits from a streaming pass over `source`, reading at most `fit_limit`
    /// rows. The source is rewound before and after.
    pub fn fit_from(
        source: &mut dyn RecordSource,
        params: &IteratorParams,
        range: NormalizationRange,
        fit_limit: Option<u64>,
    ) -> Result<Self> {
        let features = params.feature_count();
        let width = params.row_width();
        let limit = fit_limit.unwrap_or(u64::MAX);
        let mut scaler = MinMaxScaler::new(range, features);

        source.rewind()?;
        let mut rows = 0u64;
        while source.has_more() && rows < limit {
            let record = source.next_record()?;
            record.check_width(width)?;
            for f in 0..features {
                scaler.observe(f, record.numeric(f + 1)?);
            }
            rows += 1;
        }
        source.rewind()?;

        tracing::info!(
            source = %source.name(),
            rows,
            features,
            "fitted global normalization"
        );

        Ok(Self { scaler })
    }

    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }
}

impl NormalizationStrategy for GlobalFit {
    fn normalize(&mut self, batch: &mut Minibatch) -> Result<()> {
        if batch.input.is_empty() {
            return Ok(());
        }
        self.scaler.transform(&mut batch.input)
    }

    fn name(&self) -> &'static str {
        "global"
    }
}

/// Leaves inputs as read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl NormalizationStrategy for Identity {
    fn normalize(&mut self, _batch: &mut Minibatch) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Builds the configured strategy for an iterator of shape `params`.
pub fn strategy_from_config(
    config: &NormalizationConfig,
    params: &IteratorParams,
    source: &mut dyn RecordSource,
) -> Result<Box<dyn NormalizationStrategy>> {
    let range = NormalizationRange::new(config.min, config.max)?;
    Ok(match config.strategy {
        NormalizationKind::PerBatch => {
            Box::new(PerBatchRefit::new(range, params.feature_count()))
        }
        NormalizationKind::Global => {
            Box::new(GlobalFit::fit_from(source, params, range, config.fit_limit)?)
        }
        NormalizationKind::None => Box::new(Identity),
    })
}
