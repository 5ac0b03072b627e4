//! Predictive model interface
//!
//! The model itself is an external collaborator; this crate only consumes the
//! scores it produces.

use crate::data::{Dataset, Signal};
use thiserror::Error;

/// Failure reported by a model implementation
#[derive(Debug, Error)]
#[error("model failure: {0}")]
pub struct ModelError(pub String);

impl ModelError {
    /// Create a model error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A trained (or trainable) predictive model
pub trait Model {
    /// Fit the model on the dataset's train/valid segments
    fn fit(&mut self, dataset: &dyn Dataset) -> Result<(), ModelError>;

    /// Predict scores over the dataset's test segment
    fn predict(&self, dataset: &dyn Dataset) -> Result<Signal, ModelError>;
}
