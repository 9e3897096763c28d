// rust/irrigation-core/src/sensors.rs

//! Soil moisture sensor layout.
//!
//! A field has one to three sensors at different depths. Each sensor adds
//! three numeric columns to the data file, so the column count follows from
//! how many depths are supplied: 1 → 7, 2 → 10, 3 → 13.

use serde::{Deserialize, Serialize};

use crate::error::{IrrigationError, Result};

/// Input value that marks an optional sensor as not installed.
pub const ABSENT_DEPTH: f64 = -1.0;

/// Sensor depths in inches. Sensor 1 is required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorDepths {
    pub depth1: f64,
    pub depth2: Option<f64>,
    pub depth3: Option<f64>,
}

impl SensorDepths {
    pub fn new(depth1: f64, depth2: Option<f64>, depth3: Option<f64>) -> Result<Self> {
        let depths = Self {
            depth1,
            depth2: depth2.filter(|d| is_present(*d)),
            depth3: depth3.filter(|d| is_present(*d)),
        };
        depths.validate()?;
        Ok(depths)
    }

    /// Builds from form-style inputs where `-1` (or 0) means "not installed".
    pub fn from_inputs(depth1: f64, depth2: f64, depth3: f64) -> Result<Self> {
        Self::new(depth1, Some(depth2), Some(depth3))
    }

    fn validate(&self) -> Result<()> {
        if !(self.depth1.is_finite() && self.depth1 > 0.0) {
            return Err(IrrigationError::config(format!(
                "sensor depth 1 must be a positive number of inches, got {}",
                self.depth1
            )));
        }
        for (n, depth) in [(2, self.depth2), (3, self.depth3)] {
            if let Some(d) = depth {
                if !(d.is_finite() && d > 0.0) {
                    return Err(IrrigationError::config(format!(
                        "sensor depth {n} must be a positive number of inches, got {d}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Depth of sensor `n` (1-based), if installed.
    pub fn depth(&self, n: usize) -> Option<f64> {
        match n {
            1 => Some(self.depth1),
            2 => self.depth2,
            3 => self.depth3,
            _ => None,
        }
    }

    pub fn count(&self) -> usize {
        1 + usize::from(self.depth2.is_some()) + usize::from(self.depth3.is_some())
    }

    /// Numeric columns per data row for this layout.
    pub fn column_count(&self) -> i64 {
        match self.count() {
            3 => 13,
            2 => 10,
            _ => 7,
        }
    }
}

fn is_present(depth: f64) -> bool {
    depth != ABSENT_DEPTH && depth != 0.0
}
