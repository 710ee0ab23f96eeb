//! Simulated prediction backend.
//!
//! Runs the same upload validation as [`Predictor`](crate::predictor::Predictor)
//! but replaces inference with a synthetic confidence distribution. One label
//! dominates, a second takes a modest share of the remainder and the rest
//! split what is left. Which label wins is shuffled on every call.

use std::{
    path::PathBuf,
    sync::{Mutex, PoisonError, RwLock},
    thread,
    time::{Duration, Instant},
};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{info, warn};

use crate::{
    api::{ModelInfo, PredictionBackend, PredictionResult, PredictorStatus},
    config::{MockConfig, ServiceConfig},
    predictor::PredictError,
    preprocess::ImagePreprocessor,
    ranking::rank,
    store::{ArtifactError, LabelList},
};

/// Labels used when no label file is present.
pub const BUILTIN_LABELS: [&str; 13] = [
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___healthy",
    "Potato___Early_blight",
    "Potato___Late_blight",
    "Potato___healthy",
];

const MODEL_NAME: &str = "mock";
const MODEL_VERSION: &str = "simulated";

enum State {
    Uninitialized,
    Ready(LabelList),
    Failed(String),
}

/// Backend that fabricates plausible predictions without a model artifact.
pub struct MockPredictor {
    labels_path: PathBuf,
    config: MockConfig,
    preprocessor: ImagePreprocessor,
    rng: Mutex<StdRng>,
    state: RwLock<State>,
}

impl std::fmt::Debug for MockPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPredictor")
            .field("labels_path", &self.labels_path)
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl MockPredictor {
    #[must_use]
    pub fn new(labels_path: PathBuf, config: MockConfig, preprocessor: ImagePreprocessor) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            labels_path,
            config,
            preprocessor,
            rng: Mutex::new(rng),
            state: RwLock::new(State::Uninitialized),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.artifact.labels_path.clone(),
            config.mock.clone(),
            ImagePreprocessor::new(config.preprocess.clone()),
        )
    }

    fn labels(&self) -> Result<LabelList, PredictError> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Ready(labels) => Ok(labels.clone()),
            State::Uninitialized | State::Failed(_) => Err(PredictError::NotInitialized),
        }
    }

    fn set_state(&self, state: State) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn load_labels(&self) -> Result<LabelList, ArtifactError> {
        match LabelList::from_file(&self.labels_path) {
            Err(ArtifactError::LabelListNotFound { path }) => {
                warn!(path = %path.display(), "label file not found, using built-in labels");
                LabelList::new(BUILTIN_LABELS.iter().map(|&l| l.to_owned()).collect()).map_err(
                    |reason| ArtifactError::LabelListMalformed {
                        path: self.labels_path.clone(),
                        reason,
                    },
                )
            }
            other => other,
        }
    }
}

impl PredictionBackend for MockPredictor {
    fn initialize(&self) -> Result<(), ArtifactError> {
        match self.load_labels() {
            Ok(labels) => {
                info!(classes = labels.len(), "mock predictor ready");
                warn!("running in mock mode, predictions are simulated");
                self.set_state(State::Ready(labels));
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "mock predictor initialisation failed");
                self.set_state(State::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn predict(&self, image: &[u8]) -> Result<PredictionResult, PredictError> {
        let labels = self.labels()?;

        let check = self.preprocessor.validate(image);
        if !check.accepted {
            return Err(PredictError::InvalidInput(check.reason));
        }

        let started = Instant::now();
        let (latency, weights, shuffled) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let latency = rng.random_range(self.config.min_latency_ms..=self.config.max_latency_ms);
            let weights = synthesise_confidences(&mut *rng, labels.len());
            let mut shuffled = labels.as_slice().to_vec();
            shuffled.shuffle(&mut *rng);
            (latency, weights, shuffled)
        };
        thread::sleep(Duration::from_millis(latency));

        let ranked = rank(&weights, &shuffled)?;
        let result =
            PredictionResult::from_ranked(ranked, started.elapsed().as_secs_f64())
                .ok_or_else(|| PredictError::Inference("no labels to rank".into()))?;

        info!(
            predicted_class = %result.predicted_class,
            confidence = result.confidence,
            inference_time = result.inference_time,
            "mock prediction served"
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
        let labels = self.labels()?;
        let side = self.preprocessor.config().image_size as usize;
        Ok(ModelInfo {
            model_name: MODEL_NAME.into(),
            model_version: MODEL_VERSION.into(),
            num_classes: labels.len(),
            classes: labels.as_slice().to_vec(),
            input_shape: vec![side, side, 3],
        })
    }
}

/// Draw `count` confidences that sum to one.
///
/// The first entry dominates and the second takes 5-15% of what the first
/// leaves. Raw weights are normalised by their sum and the rounding residual
/// goes to the last entry.
#[expect(clippy::float_arithmetic, reason = "confidence synthesis")]
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "confidences are reported as f32"
)]
pub fn synthesise_confidences<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<f32> {
    let mut weights: Vec<f64> = Vec::with_capacity(count);
    match count {
        0 => return Vec::new(),
        1 => weights.push(1.0),
        _ => {
            let top = rng.random_range(0.75..=0.95);
            weights.push(top);
            let mut remaining = 1.0 - top;
            if count == 2 {
                weights.push(remaining);
            } else {
                let second = rng.random_range(0.05..=0.15) * remaining;
                weights.push(second);
                remaining -= second;
                let tail = count - 2;
                for i in 0..tail {
                    if i + 1 == tail {
                        weights.push(remaining);
                    } else {
                        let share = rng.random_range(0.0..=remaining / (tail - i) as f64);
                        weights.push(share);
                        remaining -= share;
                    }
                }
            }
        }
    }

    let total: f64 = weights.iter().sum();
    let mut confidences: Vec<f32> = weights.iter().map(|w| (w / total) as f32).collect();
    if let Some((last, head)) = confidences.split_last_mut() {
        let assigned: f32 = head.iter().sum();
        *last = (1.0 - assigned).max(0.0);
    }
    confidences
}
