// rust/irrigation-core/src/dataset/assembler.rs

//! Turns consecutive rows into input and label tensors.

use crate::error::{IrrigationError, Result};

use super::params::IteratorParams;
use super::source::RecordSource;
use super::tensor::{Minibatch, Tensor3};

/// Reads `num_batches * window` consecutive rows and shapes them.
///
/// Row `b * window + t` lands at time step `t` of example `b`. The date cell
/// is dropped, the middle cells become features and the last cell is the
/// label.
#[derive(Debug, Clone, Copy)]
pub struct WindowedBatchAssembler {
    params: IteratorParams,
}

impl WindowedBatchAssembler {
    pub fn new(params: IteratorParams) -> Self {
        Self { params }
    }

    /// Assembles `num_batches` examples starting at the source's position.
    ///
    /// # Errors
    ///
    /// `InsufficientData` if the source runs out first; no partial batch is
    /// ever returned. `Parse` or `RowWidth` for malformed rows.
    pub fn assemble(
        &self,
        source: &mut dyn RecordSource,
        num_batches: usize,
        batch_index: u64,
    ) -> Result<Minibatch> {
        let window = self.params.window_length;
        let features = self.params.feature_count();
        let width = self.params.row_width();
        let label_index = width - 1;

        let offset = source.position();
        let required = self.params.span(num_batches);

        let mut input = Tensor3::zeros(num_batches, features, window);
        let mut labels = Tensor3::zeros(num_batches, 1, window);

        let mut read = 0u64;
        for b in 0..num_batches {
            for t in 0..window {
                if !source.has_more() {
                    return Err(IrrigationError::insufficient_data(offset, required, read));
                }

                let record = source.next_record()?;
                read += 1;
                record.check_width(width)?;

                for f in 0..features {
                    input.set(b, f, t, record.numeric(f + 1)?);
                }
                labels.set(b, 0, t, record.numeric(label_index)?);
            }
        }

        Ok(Minibatch {
            input,
            labels,
            offset,
            batch_index,
        })
    }
}
