// rust/irrigation-core/src/config.rs

//! Configuration management for the irrigation recommendation system.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.
//!
//! Iterator shape values (`columns`, `batch_size`, `window_length`) are
//! signed and not checked here. They are resolved against the record count
//! by [`IteratorParams::resolve`](crate::dataset::IteratorParams::resolve).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{IrrigationError, Result};

// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IrsConfig {
    pub storage: StorageConfig,
    pub source: SourceConfig,
    pub iterator: IteratorSettings,
    pub normalization: NormalizationConfig,
    pub prefetch: PrefetchSettings,
    pub checkpoint: CheckpointConfig,
    pub report: ReportConfig,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative data, checkpoint and report paths resolve against.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O for large files.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// How the record source repositions to a logical offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Rewind and discard rows until the offset is reached.
    #[default]
    Linear,
    /// Seek directly using row offsets recorded while counting.
    Indexed,
}

/// What to do when the data file cannot be opened or read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSource {
    /// Fail construction with `SourceUnavailable`.
    #[default]
    Error,
    /// Log the failure and behave as an empty, permanently exhausted source.
    Degrade,
}

/// How invalid iterator shape values are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Replace invalid values with their fallbacks and report the adjustment.
    #[default]
    Clamp,
    /// Reject invalid values with a configuration error.
    Strict,
}

/// Which normalization strategy the iterator applies to each minibatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationKind {
    /// Refit the scaler on every minibatch before transforming it.
    #[default]
    PerBatch,
    /// Fit once from the source, then apply the same statistics to every batch.
    Global,
    /// Leave values untouched.
    None,
}

// Record source options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    // Cell delimiter, a single ASCII character. Cells may be quoted with '"'.
    pub delimiter: char,
    // Number of leading rows skipped as header.
    pub header_rows: usize,
    pub scan_mode: ScanMode,
    pub on_missing: MissingSource,
}

// Requested iterator shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IteratorSettings {
    // Numeric columns per row (features + label); the date column is not counted.
    pub columns: i64,
    // Examples per minibatch.
    pub batch_size: i64,
    // Consecutive records per example.
    pub window_length: i64,
    pub validation: ValidationPolicy,
}

/// Normalization options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub strategy: NormalizationKind,
    /// Lower bound of the output range.
    pub min: f32,
    /// Upper bound of the output range.
    pub max: f32,
    /// For the global strategy, fit on only the first N records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_limit: Option<u64>,
}

// Background prefetch options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchSettings {
    pub enabled: bool,
    // Number of minibatches buffered ahead of the consumer.
    pub buffer_size: usize,
}

// Cursor checkpoint options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    // Directory for storing cursor checkpoints.
    pub checkpoint_dir: PathBuf,
    // Number of recent checkpoints to keep per name.
    pub keep_last_n: usize,
    // Whether to use atomic writes (write to temp then rename).
    pub atomic_writes: bool,
}

// Recommendation report options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    // Directory the report is written to. A relative path resolves against
    // storage.base_path, not the process working directory; the two agree
    // only while base_path is "." (the default). Absolute paths are used as
    // given.
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            header_rows: 1,
            scan_mode: ScanMode::Linear,
            on_missing: MissingSource::Error,
        }
    }
}

impl Default for IteratorSettings {
    fn default() -> Self {
        Self {
            columns: 7,
            batch_size: 1,
            window_length: 30,
            validation: ValidationPolicy::Clamp,
        }
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            strategy: NormalizationKind::PerBatch,
            min: -10.0,
            max: 10.0,
            fit_limit: None,
        }
    }
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size: 4,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            keep_last_n: 3,
            atomic_writes: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl FromStr for IrsConfig {
    type Err = IrrigationError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| IrrigationError::config_with_source("failed to parse TOML config", e))
    }
}

impl IrsConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IrrigationError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `IRS_` and use underscores
    // to separate nested fields. For example:
    // - `IRS_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `IRS_SOURCE_SCAN_MODE` overrides `source.scan_mode` ("linear" or "indexed")
    // - `IRS_ITERATOR_BATCH_SIZE` overrides `iterator.batch_size`
    // - `IRS_NORMALIZATION_STRATEGY` overrides `normalization.strategy`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("IRS_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("IRS_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        // Source overrides
        if let Ok(val) = std::env::var("IRS_SOURCE_DELIMITER") {
            let mut chars = val.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                self.source.delimiter = c;
            }
        }
        if let Ok(val) = std::env::var("IRS_SOURCE_HEADER_ROWS") {
            if let Ok(v) = val.parse() {
                self.source.header_rows = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_SOURCE_SCAN_MODE") {
            match val.to_lowercase().as_str() {
                "linear" => self.source.scan_mode = ScanMode::Linear,
                "indexed" => self.source.scan_mode = ScanMode::Indexed,
                _ => {} // ignore invalid values
            }
        }
        if let Ok(val) = std::env::var("IRS_SOURCE_ON_MISSING") {
            match val.to_lowercase().as_str() {
                "error" => self.source.on_missing = MissingSource::Error,
                "degrade" => self.source.on_missing = MissingSource::Degrade,
                _ => {}
            }
        }

        // Iterator overrides
        if let Ok(val) = std::env::var("IRS_ITERATOR_COLUMNS") {
            if let Ok(v) = val.parse() {
                self.iterator.columns = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_ITERATOR_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.iterator.batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_ITERATOR_WINDOW_LENGTH") {
            if let Ok(v) = val.parse() {
                self.iterator.window_length = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_ITERATOR_VALIDATION") {
            match val.to_lowercase().as_str() {
                "clamp" => self.iterator.validation = ValidationPolicy::Clamp,
                "strict" => self.iterator.validation = ValidationPolicy::Strict,
                _ => {}
            }
        }

        // Normalization overrides
        if let Ok(val) = std::env::var("IRS_NORMALIZATION_STRATEGY") {
            match val.to_lowercase().as_str() {
                "per_batch" | "per-batch" => {
                    self.normalization.strategy = NormalizationKind::PerBatch
                }
                "global" => self.normalization.strategy = NormalizationKind::Global,
                "none" => self.normalization.strategy = NormalizationKind::None,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("IRS_NORMALIZATION_MIN") {
            if let Ok(v) = val.parse() {
                self.normalization.min = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_NORMALIZATION_MAX") {
            if let Ok(v) = val.parse() {
                self.normalization.max = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_NORMALIZATION_FIT_LIMIT") {
            if let Ok(v) = val.parse() {
                self.normalization.fit_limit = Some(v);
            }
        }

        // Prefetch overrides
        if let Ok(val) = std::env::var("IRS_PREFETCH_ENABLED") {
            if let Ok(v) = val.parse() {
                self.prefetch.enabled = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_PREFETCH_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.prefetch.buffer_size = v;
            }
        }

        // Checkpoint overrides
        if let Ok(val) = std::env::var("IRS_CHECKPOINT_DIR") {
            self.checkpoint.checkpoint_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("IRS_CHECKPOINT_KEEP_LAST_N") {
            if let Ok(v) = val.parse() {
                self.checkpoint.keep_last_n = v;
            }
        }
        if let Ok(val) = std::env::var("IRS_CHECKPOINT_ATOMIC_WRITES") {
            if let Ok(v) = val.parse() {
                self.checkpoint.atomic_writes = v;
            }
        }

        // Report overrides
        if let Ok(val) = std::env::var("IRS_REPORT_OUTPUT_DIR") {
            self.report.output_dir = PathBuf::from(val);
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(IrrigationError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        if self.source.delimiter == '\n' || self.source.delimiter == '\r' {
            return Err(IrrigationError::config(
                "source.delimiter must not be a line terminator",
            ));
        }

        if !self.source.delimiter.is_ascii() || self.source.delimiter == '"' {
            return Err(IrrigationError::config(
                "source.delimiter must be a single ASCII character other than '\"'",
            ));
        }

        let norm = &self.normalization;
        if !norm.min.is_finite() || !norm.max.is_finite() {
            return Err(IrrigationError::config(
                "normalization.min and normalization.max must be finite",
            ));
        }
        if norm.min >= norm.max {
            return Err(IrrigationError::config(format!(
                "normalization.min ({}) must be less than normalization.max ({})",
                norm.min, norm.max
            )));
        }
        if norm.fit_limit == Some(0) {
            return Err(IrrigationError::config(
                "normalization.fit_limit must be greater than 0 when set",
            ));
        }

        if self.prefetch.enabled && self.prefetch.buffer_size == 0 {
            return Err(IrrigationError::config(
                "prefetch.buffer_size must be greater than 0 when prefetch is enabled",
            ));
        }

        if self.checkpoint.keep_last_n == 0 {
            return Err(IrrigationError::config(
                "checkpoint.keep_last_n must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = IrsConfig::default();

        assert_eq!(config.storage.base_path, PathBuf::from("."));
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(config.storage.use_mmap);

        assert_eq!(config.source.delimiter, ',');
        assert_eq!(config.source.header_rows, 1);
        assert_eq!(config.source.scan_mode, ScanMode::Linear);
        assert_eq!(config.source.on_missing, MissingSource::Error);

        assert_eq!(config.iterator.columns, 7);
        assert_eq!(config.iterator.batch_size, 1);
        assert_eq!(config.iterator.validation, ValidationPolicy::Clamp);

        assert_eq!(config.normalization.strategy, NormalizationKind::PerBatch);
        assert_eq!(config.normalization.min, -10.0);
        assert_eq!(config.normalization.max, 10.0);
        assert!(config.normalization.fit_limit.is_none());

        assert!(!config.prefetch.enabled);
        assert_eq!(config.checkpoint.keep_last_n, 3);
        assert!(config.checkpoint.atomic_writes);
    }

    #[test]
    fn test_default_validates() {
        assert!(IrsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: IrsConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [storage]
            base_path = "/srv/irs"
            use_mmap = false

            [source]
            delimiter = ";"
            header_rows = 2
            scan_mode = "indexed"
            on_missing = "degrade"

            [iterator]
            columns = 13
            batch_size = 4
            window_length = 14
            validation = "strict"

            [normalization]
            strategy = "global"
            min = -1.0
            max = 1.0
            fit_limit = 365

            [prefetch]
            enabled = true
            buffer_size = 8

            [checkpoint]
            checkpoint_dir = "/srv/irs/cursors"
            keep_last_n = 5
            atomic_writes = false

            [report]
            output_dir = "reports"
        "#;

        let config: IrsConfig = toml.parse().unwrap();

        assert_eq!(config.storage.base_path, PathBuf::from("/srv/irs"));
        assert!(!config.storage.use_mmap);
        assert_eq!(config.source.delimiter, ';');
        assert_eq!(config.source.header_rows, 2);
        assert_eq!(config.source.scan_mode, ScanMode::Indexed);
        assert_eq!(config.source.on_missing, MissingSource::Degrade);
        assert_eq!(config.iterator.columns, 13);
        assert_eq!(config.iterator.batch_size, 4);
        assert_eq!(config.iterator.window_length, 14);
        assert_eq!(config.iterator.validation, ValidationPolicy::Strict);
        assert_eq!(config.normalization.strategy, NormalizationKind::Global);
        assert_eq!(config.normalization.fit_limit, Some(365));
        assert!(config.prefetch.enabled);
        assert_eq!(config.prefetch.buffer_size, 8);
        assert_eq!(config.checkpoint.keep_last_n, 5);
        assert_eq!(config.report.output_dir, PathBuf::from("reports"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_shape_survives_parsing() {
        let toml = r#"
            [iterator]
            columns = -3
            batch_size = 0
            window_length = 0
        "#;
        let config: IrsConfig = toml.parse().unwrap();
        assert_eq!(config.iterator.columns, -3);
        assert_eq!(config.iterator.batch_size, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<IrsConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [iterator]
            batch_size = 2
            "#
        )
        .unwrap();

        let config = IrsConfig::from_file(file.path()).unwrap();
        assert_eq!(config.iterator.batch_size, 2);
    }

    #[test]
    fn test_from_file_not_found() {
        assert!(IrsConfig::from_file("/nonexistent/irs.toml").is_err());
    }

    #[test]
    fn test_validate_inverted_range() {
        let mut config = IrsConfig::default();
        config.normalization.min = 10.0;
        config.normalization.max = -10.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be less than"));
    }

    #[test]
    fn test_validate_zero_fit_limit() {
        let mut config = IrsConfig::default();
        config.normalization.fit_limit = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_prefetch_buffer() {
        let mut config = IrsConfig::default();
        config.prefetch.enabled = true;
        config.prefetch.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_newline_delimiter() {
        let mut config = IrsConfig::default();
        config.source.delimiter = '\n';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_non_ascii_delimiter() {
        let mut config = IrsConfig::default();
        config.source.delimiter = '§';
        assert!(config.validate().is_err());
        config.source.delimiter = '"';
        assert!(config.validate().is_err());
        config.source.delimiter = '\t';
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_keep_last_n() {
        let mut config = IrsConfig::default();
        config.checkpoint.keep_last_n = 0;
        assert!(config.validate().is_err());
    }

    // Helper to clear all IRS_ environment variables for test isolation
    fn clear_irs_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("IRS_") {
                std::env::remove_var(&key);
            }
        }
    }

    // Environment variable tests are combined into a single test to avoid
    // race conditions when tests run in parallel, since env vars are global state.
    #[test]
    fn test_env_overrides() {
        clear_irs_env_vars();

        std::env::set_var("IRS_STORAGE_BASE_PATH", "/env/path");
        std::env::set_var("IRS_SOURCE_SCAN_MODE", "indexed");
        std::env::set_var("IRS_ITERATOR_BATCH_SIZE", "8");
        std::env::set_var("IRS_ITERATOR_WINDOW_LENGTH", "-1");
        std::env::set_var("IRS_NORMALIZATION_STRATEGY", "global");
        std::env::set_var("IRS_SOURCE_DELIMITER", "\t");

        let config = IrsConfig::default().with_env_overrides();

        assert_eq!(config.storage.base_path, PathBuf::from("/env/path"));
        assert_eq!(config.source.scan_mode, ScanMode::Indexed);
        assert_eq!(config.iterator.batch_size, 8);
        assert_eq!(config.iterator.window_length, -1);
        assert_eq!(config.normalization.strategy, NormalizationKind::Global);
        assert_eq!(config.source.delimiter, '\t');

        clear_irs_env_vars();

        // Invalid values should be ignored (keep defaults)
        std::env::set_var("IRS_ITERATOR_BATCH_SIZE", "many");
        std::env::set_var("IRS_SOURCE_SCAN_MODE", "random");
        std::env::set_var("IRS_SOURCE_DELIMITER", ",,");

        let config = IrsConfig::default().with_env_overrides();

        assert_eq!(config.iterator.batch_size, 1);
        assert_eq!(config.source.scan_mode, ScanMode::Linear);
        assert_eq!(config.source.delimiter, ',');

        clear_irs_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let original = IrsConfig::default();
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: IrsConfig = toml_str.parse().unwrap();

        assert_eq!(original.storage.base_path, parsed.storage.base_path);
        assert_eq!(original.source.scan_mode, parsed.source.scan_mode);
        assert_eq!(original.iterator.window_length, parsed.iterator.window_length);
        assert_eq!(original.normalization.strategy, parsed.normalization.strategy);
    }
}
