//! Image-classification inference serving.
//!
//! A [`Predictor`] validates uploads, turns them into tensors, runs a
//! classifier loaded by an [`ArtifactStore`] and ranks the scores. The
//! [`MockPredictor`] honours the same [`PredictionBackend`] contract without
//! a model, and the `server` feature exposes either one over HTTP.

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod mock;
pub mod predictor;
pub mod preprocess;
pub mod providers;
pub mod ranking;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
#[cfg(feature = "cli")]
pub mod telemetry;

pub use api::{
    ClassPrediction, HealthReport, HealthStatus, ModelInfo, PredictionBackend, PredictionResult,
    PredictorStatus,
};
#[cfg(feature = "cli")]
pub use cli::ClassifydArgs;
pub use config::{ConfigError, ServiceConfig};
pub use mock::MockPredictor;
pub use predictor::{ErrorClass, PredictError, Predictor};
pub use preprocess::{ImagePreprocessor, ImageTensor, PreprocessError, Validation};
pub use providers::{ClassifierLoader, ImageClassifier};
pub use ranking::{RankError, rank};
pub use store::{ArtifactError, ArtifactStore, LabelList};

#[cfg(test)]
pub(crate) mod tests;
