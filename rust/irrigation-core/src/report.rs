// rust/irrigation-core/src/report.rs

//! Plain-text irrigation recommendation report.

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate};

use crate::error::{IrrigationError, Result};
use crate::sensors::SensorDepths;
use crate::storage::StorageBackend;

const RECOMMENDATION_PREFIX: &str =
    "Recommendation: Based on the SMS and weather data input into the model,";

/// A next-day irrigation recommendation for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    crop: String,
    soil: String,
    depths: SensorDepths,
    date: NaiveDate,
    /// Inches to irrigate tomorrow; `None` means no irrigation.
    amount: Option<f64>,
}

impl Recommendation {
    /// Creates a recommendation dated today (local time).
    pub fn new(
        crop: impl Into<String>,
        soil: impl Into<String>,
        depths: SensorDepths,
        amount: Option<f64>,
    ) -> Result<Self> {
        let crop = crop.into();
        let soil = soil.into();
        if crop.trim().is_empty() {
            return Err(IrrigationError::report("crop type is required"));
        }
        if soil.trim().is_empty() {
            return Err(IrrigationError::report("soil type is required"));
        }

        Ok(Self {
            crop,
            soil,
            depths,
            date: Local::now().date_naive(),
            amount,
        })
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn amount(&self) -> Option<f64> {
        self.amount
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// `Report<CROP><soil><month><day><year>.txt`, month and day unpadded.
    pub fn file_name(&self) -> String {
        format!(
            "Report{}{}{}{}{}.txt",
            self.crop.to_uppercase(),
            self.soil.to_lowercase(),
            self.date.month(),
            self.date.day(),
            self.date.year()
        )
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Irrigation Recommendation Report for {}/{}/{}",
            self.date.month(),
            self.date.day(),
            self.date.year()
        );
        let _ = writeln!(out, "Crop Type: {}", self.crop);
        let _ = writeln!(out, "Soil Type: {}", self.soil);

        for n in 1..=3 {
            match self.depths.depth(n) {
                Some(depth) => {
                    let _ = writeln!(out, "Sensor Depth {n}: {} inches", format_inches(depth));
                }
                None => {
                    let _ = writeln!(out, "Sensor Depth {n}: N/A");
                }
            }
        }

        out.push('\n');
        match self.amount {
            Some(amount) => {
                let _ = writeln!(
                    out,
                    "{RECOMMENDATION_PREFIX} tomorrow's recommended irrigation amount is {} inches.",
                    format_inches(amount)
                );
            }
            None => {
                let _ = writeln!(out, "{RECOMMENDATION_PREFIX} no irrigation is recommended tomorrow.");
            }
        }
        out
    }

    /// Writes the report into `output_dir` and returns its path.
    ///
    /// A relative `output_dir` is resolved by `storage`, so with
    /// [`LocalStorage`](crate::storage::LocalStorage) it lands under the
    /// storage base path rather than the working directory.
    pub fn write(&self, storage: &dyn StorageBackend, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(self.file_name());
        let mut writer = storage.open_write(&path)?;
        writer
            .write_all(self.render().as_bytes())
            .map_err(|e| IrrigationError::storage_with_source(&path, "failed to write report", e))?;
        writer.finish()?;

        tracing::info!(
            path = %path.display(),
            crop = %self.crop,
            soil = %self.soil,
            amount = ?self.amount,
            "recommendation report written"
        );
        Ok(path)
    }
}

/// Whole numbers keep one decimal place, e.g. `6.0`.
fn format_inches(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
