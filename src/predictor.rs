//! Real prediction backend: validation, preprocessing, inference and ranking.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};

use ndarray::Array2;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    api::{ModelInfo, PredictionBackend, PredictionResult, PredictorStatus},
    config::ServiceConfig,
    preprocess::{ImagePreprocessor, PreprocessError},
    providers::{ClassifierLoader, ImageClassifier},
    ranking::{RankError, rank},
    store::{ArtifactError, ArtifactStore, LoadedArtifact},
};

/// Per-request failures, tagged by stage.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model not initialized")]
    NotInitialized,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error(transparent)]
    DimensionMismatch(#[from] RankError),
}

/// Response class a [`PredictError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller sent something unusable; retrying unchanged will not help.
    ClientError,
    /// The backend is not ready to serve.
    Unavailable,
    /// A runtime fault inside the service.
    ServerError,
}

impl PredictError {
    /// Classify the failure for the transport layer.
    ///
    /// # Examples
    ///
    /// ```
    /// use classify_serve::predictor::{ErrorClass, PredictError};
    ///
    /// assert_eq!(PredictError::NotInitialized.class(), ErrorClass::Unavailable);
    /// assert_eq!(
    ///     PredictError::InvalidInput("Empty image payload".into()).class(),
    ///     ErrorClass::ClientError,
    /// );
    /// ```
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput(_) | Self::Preprocess(_) => ErrorClass::ClientError,
            Self::NotInitialized => ErrorClass::Unavailable,
            Self::Inference(_) | Self::DimensionMismatch(_) => ErrorClass::ServerError,
        }
    }
}

enum State<C> {
    Uninitialized,
    Ready(Arc<LoadedArtifact<C>>),
    Failed(String),
}

/// Serves predictions from a classifier loaded through an [`ArtifactStore`].
///
/// Created uninitialised. [`PredictionBackend::initialize`] must succeed
/// before any prediction is served.
pub struct Predictor<L: ClassifierLoader> {
    store: ArtifactStore<L>,
    preprocessor: ImagePreprocessor,
    state: RwLock<State<L::Classifier>>,
}

impl<L: ClassifierLoader> fmt::Debug for Predictor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predictor")
            .field("store", &self.store)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<L: ClassifierLoader> Predictor<L> {
    /// Combine a store and a preprocessor into an uninitialised predictor.
    #[must_use]
    pub fn new(store: ArtifactStore<L>, preprocessor: ImagePreprocessor) -> Self {
        Self {
            store,
            preprocessor,
            state: RwLock::new(State::Uninitialized),
        }
    }

    /// Wire a store and preprocessor from validated configuration.
    #[must_use]
    pub fn from_config(loader: L, config: &ServiceConfig) -> Self {
        let store = ArtifactStore::new(
            loader,
            config.artifact.clone(),
            config.preprocess.image_size,
        );
        Self::new(store, ImagePreprocessor::new(config.preprocess.clone()))
    }

    fn ready_artifact(&self) -> Result<Arc<LoadedArtifact<L::Classifier>>, PredictError> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Ready(loaded) => Ok(Arc::clone(loaded)),
            State::Uninitialized | State::Failed(_) => Err(PredictError::NotInitialized),
        }
    }

    fn set_state(&self, state: State<L::Classifier>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl<L: ClassifierLoader> PredictionBackend for Predictor<L> {
    fn initialize(&self) -> Result<(), ArtifactError> {
        match self.store.load() {
            Ok(loaded) => {
                info!(classes = loaded.labels.len(), "predictor ready");
                self.set_state(State::Ready(loaded));
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "predictor initialisation failed");
                self.set_state(State::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn predict(&self, image: &[u8]) -> Result<PredictionResult, PredictError> {
        let loaded = self.ready_artifact()?;

        let decoded = self
            .preprocessor
            .admit(image)
            .map_err(|rejection| PredictError::InvalidInput(rejection.reason))?;
        let tensor = self.preprocessor.preprocess_image(decoded)?;

        let started = Instant::now();
        let scores = loaded
            .classifier
            .classify(&tensor)
            .map_err(|e| PredictError::Inference(e.to_string()))?;
        let elapsed = started.elapsed().as_secs_f64();

        let row = single_row(&scores)?;
        let ranked = rank(&row, loaded.labels.as_slice())?;
        let result = PredictionResult::from_ranked(ranked, elapsed)
            .ok_or_else(|| PredictError::Inference("model produced no scores".into()))?;

        info!(
            predicted_class = %result.predicted_class,
            confidence = result.confidence,
            inference_time = result.inference_time,
            "prediction served"
        );
        Ok(result)
    }

    fn status(&self) -> PredictorStatus {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Uninitialized => PredictorStatus::Uninitialized,
            State::Ready(_) => PredictorStatus::Ready,
            State::Failed(reason) => PredictorStatus::Failed(reason.clone()),
        }
    }

    fn model_info(&self) -> Result<ModelInfo, PredictError> {
        self.ready_artifact()?;
        self.store
            .model_info()
            .map_err(|_| PredictError::NotInitialized)
    }
}

/// Strip the batch axis from a `(1, classes)` score matrix.
fn single_row(scores: &Array2<f32>) -> Result<Vec<f32>, PredictError> {
    let rows = scores.nrows();
    let mut outer = scores.outer_iter();
    let (Some(row), None) = (outer.next(), outer.next()) else {
        return Err(PredictError::Inference(format!(
            "expected a single batch row, model returned {rows}"
        )));
    };
    if let Some(position) = row.iter().position(|score| !score.is_finite()) {
        return Err(PredictError::Inference(format!(
            "model returned a non-finite score at position {position}"
        )));
    }
    Ok(row.to_vec())
}
