// rust/irrigation-core/src/model.rs

//! Interface to the sequence model that learns from the minibatches.
//!
//! The network itself lives outside this crate; anything that can train on
//! a [`Minibatch`] and predict a label sequence from an input tensor can be
//! driven by the [`Advisor`](crate::Advisor).

use crate::dataset::{Minibatch, Tensor3};
use crate::error::Result;

pub trait SequenceModel {
    /// One training step on `batch`.
    fn fit(&mut self, batch: &Minibatch) -> Result<()>;

    /// Predicts labels for `input` `(batch, features, window)`.
    ///
    /// The result is shaped `(batch, 1, window)`: one irrigation amount per
    /// time step.
    fn predict(&mut self, input: &Tensor3) -> Result<Tensor3>;
}

impl<M: SequenceModel + ?Sized> SequenceModel for Box<M> {
    fn fit(&mut self, batch: &Minibatch) -> Result<()> {
        (**self).fit(batch)
    }

    fn predict(&mut self, input: &Tensor3) -> Result<Tensor3> {
        (**self).predict(input)
    }
}
