//! Public result types and the backend contract shared by every predictor.

use serde::{Deserialize, Serialize};

use crate::{predictor::PredictError, store::ArtifactError};

/// Confidence assigned to one class.
///
/// # Examples
///
/// ```
/// use classify_serve::api::ClassPrediction;
///
/// let p = ClassPrediction::new("Tomato___healthy", 0.9);
/// assert_eq!(p.class_name, "Tomato___healthy");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPrediction {
    pub class_name: String,
    pub confidence: f32,
}

impl ClassPrediction {
    /// Pair a class name with its confidence.
    #[must_use]
    pub fn new(class_name: impl Into<String>, confidence: f32) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
        }
    }
}

/// Outcome of a single prediction request.
///
/// `all_predictions` is sorted by descending confidence and its first entry
/// always matches `predicted_class` and `confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_class: String,
    pub confidence: f32,
    pub all_predictions: Vec<ClassPrediction>,
    /// Wall-clock inference time in seconds, rounded to milliseconds.
    pub inference_time: f64,
}

impl PredictionResult {
    /// Assemble a result from ranked predictions.
    ///
    /// Returns [`None`] when `ranked` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use classify_serve::api::{ClassPrediction, PredictionResult};
    ///
    /// let ranked = vec![ClassPrediction::new("a", 0.7), ClassPrediction::new("b", 0.3)];
    /// let result = PredictionResult::from_ranked(ranked, 0.012_345).unwrap();
    /// assert_eq!(result.predicted_class, "a");
    /// assert_eq!(result.inference_time, 0.012);
    /// ```
    #[must_use]
    pub fn from_ranked(ranked: Vec<ClassPrediction>, elapsed_secs: f64) -> Option<Self> {
        let top = ranked.first()?.clone();
        Some(Self {
            predicted_class: top.class_name,
            confidence: top.confidence,
            all_predictions: ranked,
            inference_time: round_millis(elapsed_secs),
        })
    }
}

#[expect(clippy::float_arithmetic, reason = "millisecond rounding")]
fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// Description of the loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_version: String,
    pub num_classes: usize,
    pub classes: Vec<String>,
    /// Input shape without the batch dimension: `[height, width, channels]`.
    pub input_shape: Vec<usize>,
}

/// Coarse service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Health summary reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub model_loaded: bool,
    pub version: String,
}

impl HealthReport {
    /// Build a report from the backend readiness flag.
    ///
    /// # Examples
    ///
    /// ```
    /// use classify_serve::api::{HealthReport, HealthStatus};
    ///
    /// let report = HealthReport::new(false, "1.0.0");
    /// assert_eq!(report.status, HealthStatus::Degraded);
    /// ```
    #[must_use]
    pub fn new(model_loaded: bool, version: impl Into<String>) -> Self {
        Self {
            status: if model_loaded {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            model_loaded,
            version: version.into(),
        }
    }
}

/// Lifecycle of a prediction backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictorStatus {
    Uninitialized,
    Ready,
    /// Initialisation failed; holds the rendered error.
    Failed(String),
}

/// Contract shared by the real and the simulated predictor.
///
/// The HTTP layer is generic over this trait and never branches on which
/// implementation it was handed.
pub trait PredictionBackend: Send + Sync + 'static {
    /// Load whatever the backend needs and enter the ready state.
    ///
    /// Calling this again after a failure retries the load.
    ///
    /// # Errors
    ///
    /// Returns an [`ArtifactError`] when the artifact or label list cannot be
    /// loaded. The backend then reports [`PredictorStatus::Failed`].
    fn initialize(&self) -> Result<(), ArtifactError>;

    /// Classify one uploaded image.
    ///
    /// # Errors
    ///
    /// Returns a [`PredictError`] describing which stage rejected the request.
    fn predict(&self, image: &[u8]) -> Result<PredictionResult, PredictError>;

    /// Current lifecycle state.
    fn status(&self) -> PredictorStatus;

    /// Describe the loaded model.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::NotInitialized`] unless the backend is ready.
    fn model_info(&self) -> Result<ModelInfo, PredictError>;

    /// Whether [`Self::status`] is [`PredictorStatus::Ready`].
    fn is_initialized(&self) -> bool {
        self.status() == PredictorStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(0.123_456, 0.123)]
    #[case(0.012_6, 0.013)]
    #[case(1.999_9, 2.0)]
    fn rounds_to_millis(#[case] input: f64, #[case] expected: f64) {
        #[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
        let diff = (round_millis(input) - expected).abs();
        assert!(diff < 1e-12);
    }

    #[rstest]
    fn empty_ranking_yields_no_result() {
        assert!(PredictionResult::from_ranked(Vec::new(), 0.1).is_none());
    }

    #[rstest]
    fn health_report_serialises_lowercase_status() {
        let report = HealthReport::new(true, "1.0.0");
        #[expect(clippy::expect_used, reason = "test should fail loudly")]
        let json = serde_json::to_string(&report).expect("serialise HealthReport");
        assert_eq!(
            json,
            r#"{"status":"healthy","model_loaded":true,"version":"1.0.0"}"#
        );
    }
}
