// rust/irrigation-core/src/dataset/tensor.rs

use serde::{Deserialize, Serialize};

/// Dense 3-D `f32` tensor in row-major `(batch, feature, time)` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor3 {
    shape: [usize; 3],
    data: Vec<f32>,
}

impl Tensor3 {
    pub fn zeros(batch: usize, features: usize, steps: usize) -> Self {
        Self {
            shape: [batch, features, steps],
            data: vec![0.0; batch * features * steps],
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn index(&self, b: usize, f: usize, t: usize) -> usize {
        debug_assert!(b < self.shape[0] && f < self.shape[1] && t < self.shape[2]);
        (b * self.shape[1] + f) * self.shape[2] + t
    }

    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn get(&self, b: usize, f: usize, t: usize) -> f32 {
        self.data[self.index(b, f, t)]
    }

    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn set(&mut self, b: usize, f: usize, t: usize, value: f32) {
        let i = self.index(b, f, t);
        self.data[i] = value;
    }

    /// Values of one feature across every batch entry and time step.
    pub fn feature_values(&self, f: usize) -> impl Iterator<Item = f32> + '_ {
        let [batch, features, steps] = self.shape;
        (0..batch).flat_map(move |b| {
            let start = (b * features + f) * steps;
            self.data[start..start + steps].iter().copied()
        })
    }

    /// Applies `op` to every value of feature `f`.
    pub fn map_feature(&mut self, f: usize, mut op: impl FnMut(f32) -> f32) {
        let [batch, features, steps] = self.shape;
        for b in 0..batch {
            let start = (b * features + f) * steps;
            for value in &mut self.data[start..start + steps] {
                *value = op(*value);
            }
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// One assembled batch of examples.
#[derive(Debug, Clone, PartialEq)]
pub struct Minibatch {
    /// `(batch, features, window)`.
    pub input: Tensor3,
    /// `(batch, 1, window)`.
    pub labels: Tensor3,
    /// Record offset of the first row in this batch.
    pub offset: u64,
    /// Sequential index of this batch since the iterator was created or reset.
    pub batch_index: u64,
}

impl Minibatch {
    pub fn batch_size(&self) -> usize {
        self.input.shape()[0]
    }

    pub fn window(&self) -> usize {
        self.input.shape()[2]
    }

    /// Label of the last time step of the last example.
    pub fn last_label(&self) -> Option<f32> {
        let [batch, _, steps] = self.labels.shape();
        if batch == 0 || steps == 0 {
            return None;
        }
        Some(self.labels.get(batch - 1, 0, steps - 1))
    }
}
