// rust/irrigation-core/src/advisor.rs

//! Orchestration of a recommendation run.
//!
//! The `Advisor` owns the storage backend and configuration and ties the
//! pieces together: it opens datasets for a sensor layout, trains a
//! [`SequenceModel`] over them, asks it for tomorrow's irrigation amount,
//! writes the report and saves or restores iterator cursors.
//!
//! # Example
//!
//! ```no_run
//! use irrigation_core::{Advisor, SensorDepths};
//! # use irrigation_core::{Minibatch, SequenceModel, Tensor3};
//! # struct Network;
//! # impl SequenceModel for Network {
//! #     fn fit(&mut self, _: &Minibatch) -> irrigation_core::Result<()> { Ok(()) }
//! #     fn predict(&mut self, input: &Tensor3) -> irrigation_core::Result<Tensor3> {
//! #         Ok(Tensor3::zeros(input.shape()[0], 1, input.shape()[2]))
//! #     }
//! # }
//!
//! let advisor = Advisor::from_config_file("irs.toml").unwrap();
//! let depths = SensorDepths::new(6.0, Some(12.0), None).unwrap();
//! let mut network = Network;
//!
//! let advice = advisor
//!     .advise("field.csv", "Cotton", "sandy", depths, &mut network, 10)
//!     .unwrap();
//! println!("report written to {}", advice.report_path.display());
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checkpoint::{CheckpointReader, CheckpointWriter};
use crate::config::IrsConfig;
use crate::dataset::{PrefetchingIterator, WindowedIterator};
use crate::error::{IrrigationError, Result};
use crate::model::SequenceModel;
use crate::report::Recommendation;
use crate::sensors::SensorDepths;
use crate::storage::{LocalStorage, StorageBackend};

/// Counts from a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainingSummary {
    pub epochs: usize,
    pub batches: u64,
}

/// Outcome of [`Advisor::advise`].
#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    /// Inches to irrigate tomorrow, `None` for no irrigation.
    pub amount: Option<f64>,
    pub report_path: PathBuf,
    pub training: TrainingSummary,
}

pub struct Advisor {
    config: IrsConfig,
    storage: Arc<dyn StorageBackend>,
    checkpoint_writer: CheckpointWriter,
    checkpoint_reader: CheckpointReader,
}

impl Advisor {
    /// Creates an advisor with default configuration.
    pub fn new() -> Result<Self> {
        Self::from_config(IrsConfig::default())
    }

    /// Loads configuration from a TOML file, then applies `IRS_*`
    /// environment overrides.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = IrsConfig::from_file(path)?.with_env_overrides();
        Self::from_config(config)
    }

    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the storage
    /// backend cannot be initialized.
    pub fn from_config(config: IrsConfig) -> Result<Self> {
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        Self::with_storage(config, storage)
    }

    /// Uses an already constructed storage backend.
    pub fn with_storage(config: IrsConfig, storage: Arc<dyn StorageBackend>) -> Result<Self> {
        config.validate()?;

        let checkpoint_writer = CheckpointWriter::new(storage.clone(), config.checkpoint.clone());
        let checkpoint_reader = CheckpointReader::new(storage.clone());

        Ok(Self {
            config,
            storage,
            checkpoint_writer,
            checkpoint_reader,
        })
    }

    pub fn config(&self) -> &IrsConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Opens a dataset with the configured iterator shape.
    pub fn open_dataset(&self, path: impl AsRef<Path>) -> Result<WindowedIterator> {
        WindowedIterator::open(&*self.storage, path.as_ref(), &self.config)
    }

    /// Opens a dataset whose column count follows from the sensor layout.
    pub fn open_dataset_for_sensors(
        &self,
        path: impl AsRef<Path>,
        depths: &SensorDepths,
    ) -> Result<WindowedIterator> {
        let mut config = self.config.clone();
        config.iterator.columns = depths.column_count();

        tracing::debug!(
            sensors = depths.count(),
            columns = config.iterator.columns,
            "column count from sensor layout"
        );

        WindowedIterator::open(&*self.storage, path.as_ref(), &config)
    }

    /// Trains `model` for `epochs` passes over `iter`.
    ///
    /// The first pass starts at the iterator's current cursor; the iterator
    /// is reset before every later pass. Batches are prefetched on a
    /// background thread when the configuration enables it.
    pub fn train(
        &self,
        iter: WindowedIterator,
        model: &mut dyn SequenceModel,
        epochs: usize,
    ) -> Result<(WindowedIterator, TrainingSummary)> {
        let mut iter = iter;
        let mut summary = TrainingSummary::default();

        for epoch in 0..epochs {
            if epoch > 0 {
                iter.reset()?;
            }

            let mut prefetch = PrefetchingIterator::new(iter, &self.config.prefetch);
            let mut batches = 0u64;
            let outcome = loop {
                match prefetch.next_batch() {
                    Ok(Some(batch)) => {
                        if let Err(e) = model.fit(&batch) {
                            break Err(e);
                        }
                        batches += 1;
                    }
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };

            iter = prefetch
                .into_inner()
                .ok_or_else(|| IrrigationError::config("prefetch thread did not return the iterator"))?;
            outcome?;

            summary.epochs += 1;
            summary.batches += batches;
            tracing::info!(epoch, batches, "epoch complete");
        }

        Ok((iter, summary))
    }

    /// Predicts tomorrow's irrigation amount from the last window of the file.
    ///
    /// The model's output at the final time step is the amount in inches;
    /// a value that is not positive means no irrigation.
    pub fn predict_next_day(
        &self,
        iter: &mut WindowedIterator,
        model: &mut dyn SequenceModel,
    ) -> Result<Option<f64>> {
        let Some(batch) = iter.last_window()? else {
            tracing::warn!(
                file_records = iter.file_records(),
                window = iter.window_length(),
                "not enough records for a prediction window"
            );
            return Ok(None);
        };

        let output = model.predict(&batch.input)?;
        let [b, _, steps] = output.shape();
        if b == 0 || steps == 0 {
            return Err(IrrigationError::config(format!(
                "model returned an empty prediction of shape {:?}",
                output.shape()
            )));
        }

        let amount = f64::from(output.get(b - 1, 0, steps - 1));
        tracing::info!(amount, "next-day prediction");
        Ok((amount.is_finite() && amount > 0.0).then_some(amount))
    }

    /// Writes the recommendation report into the configured output directory.
    pub fn recommend(
        &self,
        crop: &str,
        soil: &str,
        depths: SensorDepths,
        amount: Option<f64>,
    ) -> Result<PathBuf> {
        let recommendation = Recommendation::new(crop, soil, depths, amount)?;
        recommendation.write(&*self.storage, &self.config.report.output_dir)
    }

    /// Full run: open the data file for the sensor layout, train, predict
    /// and write the report.
    pub fn advise(
        &self,
        data_path: impl AsRef<Path>,
        crop: &str,
        soil: &str,
        depths: SensorDepths,
        model: &mut dyn SequenceModel,
        epochs: usize,
    ) -> Result<Advice> {
        let iter = self.open_dataset_for_sensors(data_path, &depths)?;
        let (mut iter, training) = self.train(iter, model, epochs)?;
        let amount = self.predict_next_day(&mut iter, model)?;
        let report_path = self.recommend(crop, soil, depths, amount)?;

        Ok(Advice {
            amount,
            report_path,
            training,
        })
    }

    /// Saves the iterator's cursor under `name`.
    pub fn save_cursor(&self, name: &str, iter: &WindowedIterator) -> Result<PathBuf> {
        self.checkpoint_writer.write(name, &iter.snapshot())
    }

    /// Restores the newest cursor saved under `name`, if there is one.
    ///
    /// Returns `Ok(false)` when no checkpoint exists.
    pub fn resume_cursor(&self, name: &str, iter: &mut WindowedIterator) -> Result<bool> {
        let Some(path) = self
            .checkpoint_reader
            .latest(&self.config.checkpoint.checkpoint_dir, name)?
        else {
            return Ok(false);
        };

        let snapshot = self.checkpoint_reader.read(&path)?;
        iter.restore(&snapshot)?;
        tracing::info!(path = %path.display(), "resumed cursor from checkpoint");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PrefetchSettings, StorageConfig};
    use crate::dataset::{Minibatch, Tensor3};
    use crate::test_support::{numbered_csv, MemoryStorage};
    use tempfile::TempDir;

    /// Records training calls and predicts a fixed amount at every step.
    struct FixedModel {
        fitted: Vec<u64>,
        output: f32,
        last_input: Option<[usize; 3]>,
    }

    impl FixedModel {
        fn new(output: f32) -> Self {
            Self {
                fitted: Vec::new(),
                output,
                last_input: None,
            }
        }
    }

    impl SequenceModel for FixedModel {
        fn fit(&mut self, batch: &Minibatch) -> Result<()> {
            self.fitted.push(batch.offset);
            Ok(())
        }

        fn predict(&mut self, input: &Tensor3) -> Result<Tensor3> {
            let [b, _, t] = input.shape();
            self.last_input = Some(input.shape());
            let mut out = Tensor3::zeros(b, 1, t);
            for i in 0..b {
                for s in 0..t {
                    out.set(i, 0, s, self.output);
                }
            }
            Ok(out)
        }
    }

    fn advisor_with(config: IrsConfig) -> (Advisor, MemoryStorage) {
        let storage = MemoryStorage::new();
        let advisor = Advisor::with_storage(config, Arc::new(storage.clone())).unwrap();
        (advisor, storage)
    }

    fn small_config() -> IrsConfig {
        let mut config = IrsConfig::default();
        config.iterator.batch_size = 2;
        config.iterator.window_length = 3;
        config.report.output_dir = PathBuf::from("reports");
        config
    }

    #[test]
    fn test_open_dataset_for_sensors_sets_columns() {
        let (advisor, storage) = advisor_with(small_config());
        storage.add_file("two.csv", numbered_csv(30, 10));

        let depths = SensorDepths::new(6.0, Some(12.0), None).unwrap();
        let iter = advisor.open_dataset_for_sensors("two.csv", &depths).unwrap();
        assert_eq!(iter.columns(), 10);
        assert_eq!(iter.feature_count(), 9);
    }

    #[test]
    fn test_train_resets_between_epochs() {
        let (advisor, storage) = advisor_with(small_config());
        storage.add_file("field.csv", numbered_csv(24, 7));

        let iter = advisor.open_dataset("field.csv").unwrap();
        let mut model = FixedModel::new(0.0);
        let (iter, summary) = advisor.train(iter, &mut model, 2).unwrap();

        // Epoch 1 starts at 0: 0, 6, 12, 18. After reset: 1, 7, 13.
        assert_eq!(model.fitted, vec![0, 6, 12, 18, 1, 7, 13]);
        assert_eq!(summary, TrainingSummary { epochs: 2, batches: 7 });
        assert!(!iter.has_next());
    }

    #[test]
    fn test_train_with_prefetch_matches_direct() {
        let mut config = small_config();
        config.prefetch = PrefetchSettings {
            enabled: true,
            buffer_size: 2,
        };
        let (advisor, storage) = advisor_with(config);
        storage.add_file("field.csv", numbered_csv(24, 7));

        let mut model = FixedModel::new(0.0);
        let iter = advisor.open_dataset("field.csv").unwrap();
        let (_, summary) = advisor.train(iter, &mut model, 1).unwrap();
        assert_eq!(model.fitted, vec![0, 6, 12, 18]);
        assert_eq!(summary.batches, 4);
    }

    #[test]
    fn test_predict_positive_and_non_positive() {
        let (advisor, storage) = advisor_with(small_config());
        storage.add_file("field.csv", numbered_csv(24, 7));
        let mut iter = advisor.open_dataset("field.csv").unwrap();

        let mut wet = FixedModel::new(0.5);
        assert_eq!(advisor.predict_next_day(&mut iter, &mut wet).unwrap(), Some(0.5));
        assert_eq!(wet.last_input, Some([1, 6, 3]));

        let mut dry = FixedModel::new(-0.2);
        assert_eq!(advisor.predict_next_day(&mut iter, &mut dry).unwrap(), None);
    }

    #[test]
    fn test_advise_writes_report() {
        let (advisor, storage) = advisor_with(small_config());
        storage.add_file("field.csv", numbered_csv(24, 7));

        let depths = SensorDepths::new(6.0, None, None).unwrap();
        let mut model = FixedModel::new(1.25);
        let advice = advisor
            .advise("field.csv", "Peanut", "Clay", depths, &mut model, 1)
            .unwrap();

        assert_eq!(advice.amount, Some(1.25));
        assert_eq!(advice.training.batches, 4);
        assert!(advice.report_path.starts_with("reports"));

        let text = String::from_utf8(storage.contents(&advice.report_path).unwrap()).unwrap();
        assert!(text.contains("Crop Type: Peanut"));
        assert!(text.contains("amount is 1.25 inches."));
    }

    #[test]
    fn test_advise_missing_file() {
        let (advisor, _) = advisor_with(small_config());
        let depths = SensorDepths::new(6.0, None, None).unwrap();
        let mut model = FixedModel::new(1.0);
        let err = advisor
            .advise("absent.csv", "Corn", "loam", depths, &mut model, 1)
            .unwrap_err();
        assert!(matches!(err, IrrigationError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_save_and_resume_cursor() {
        let temp = TempDir::new().unwrap();
        let mut config = small_config();
        config.storage = StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        };
        std::fs::write(temp.path().join("field.csv"), numbered_csv(30, 7)).unwrap();

        let advisor = Advisor::from_config(config).unwrap();

        let mut fresh = advisor.open_dataset("field.csv").unwrap();
        assert!(!advisor.resume_cursor("field", &mut fresh).unwrap());

        let mut iter = advisor.open_dataset("field.csv").unwrap();
        iter.next_batch().unwrap();
        iter.next_batch().unwrap();
        advisor.save_cursor("field", &iter).unwrap();
        let expected = iter.next_batch().unwrap().unwrap();

        assert!(advisor.resume_cursor("field", &mut fresh).unwrap());
        assert_eq!(fresh.cursor_offset(), 12);
        assert_eq!(fresh.next_batch().unwrap().unwrap(), expected);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = IrsConfig::default();
        config.normalization.min = 5.0;
        config.normalization.max = -5.0;
        assert!(Advisor::with_storage(config, Arc::new(MemoryStorage::new())).is_err());
    }
}
