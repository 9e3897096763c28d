// rust/irrigation-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrrigationError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Record source '{path}' is unavailable: {message}")]
    SourceUnavailable {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid numeric value '{value}' at line {line}, column {column}")]
    Parse {
        line: u64,
        column: usize,
        value: String,
    },

    #[error("Row at line {line} has {found} cells, expected {expected}")]
    RowWidth {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Insufficient data: batch needs {required} records from offset {offset}, only {read} could be read")]
    InsufficientData {
        offset: u64,
        required: u64,
        read: u64,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Checkpoint error: {message}")]
    Checkpoint {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Report error: {message}")]
    Report {
        message: String,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, IrrigationError>;

// Convenience constructors
impl IrrigationError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn source_unavailable(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<std::io::Error>,
    ) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    pub fn parse(line: u64, column: usize, value: impl Into<String>) -> Self {
        Self::Parse {
            line,
            column,
            value: value.into(),
        }
    }

    pub fn row_width(line: u64, expected: usize, found: usize) -> Self {
        Self::RowWidth { line, expected, found }
    }

    pub fn insufficient_data(offset: u64, required: u64, read: u64) -> Self {
        Self::InsufficientData { offset, required, read }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
            source: None,
        }
    }

    pub fn checkpoint_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Checkpoint {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by the contents of the data file
    /// rather than by the environment or configuration.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::RowWidth { .. } | Self::InsufficientData { .. }
        )
    }
}
