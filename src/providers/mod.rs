//! Provider interfaces for trained classifiers.
//!
//! A classifier artifact is anything that maps an [`ImageTensor`] to a batch
//! of per-class scores. Loaders turn a file on disk into such a classifier so
//! the artifact store can stay agnostic of the inference engine.

pub mod artefact;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::path::Path;

use ndarray::Array2;

use crate::preprocess::ImageTensor;

/// Evaluates a trained model on one preprocessed image.
///
/// Implementations must be safe to share across request threads. Engines that
/// cannot evaluate concurrently serialise internally.
pub trait ImageClassifier: Send + Sync + 'static {
    /// Error type returned when evaluation fails.
    ///
    /// Errors must implement `std::error::Error` and be `Send + Sync + 'static`
    /// so they can be rendered into request failures on any thread.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run a forward pass.
    ///
    /// The returned array has one row per batch entry and one column per
    /// class.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to evaluate the input.
    fn classify(&self, input: &ImageTensor) -> Result<Array2<f32>, Self::Error>;
}

/// Deserialises a classifier artifact from disk.
pub trait ClassifierLoader: Send + Sync + 'static {
    type Classifier: ImageClassifier;
    /// Error type returned when the artifact cannot be turned into a classifier.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is corrupt or in an unsupported format.
    fn load(&self, path: &Path) -> Result<Self::Classifier, Self::Error>;
}
