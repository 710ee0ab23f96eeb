//! HTTP surface over any [`PredictionBackend`].
//!
//! Handlers stay thin: they extract the upload, hand it to the backend on a
//! blocking thread and translate [`ErrorClass`] into a status code.

use std::{any::Any, sync::Arc};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::{
    api::{HealthReport, ModelInfo, PredictionBackend, PredictionResult},
    config::{Environment, PreprocessConfig, ServiceConfig},
    predictor::{ErrorClass, PredictError},
};

/// Slack on top of the upload limit for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
const UPLOAD_FIELD: &str = "file";
const GENERIC_DETAIL: &str = "An unexpected error occurred";

/// Settings the router needs from [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub service_name: String,
    pub service_version: String,
    pub environment: Environment,
    pub preprocess: PreprocessConfig,
}

impl ServerSettings {
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            service_name: config.server.service_name.clone(),
            service_version: config.server.service_version.clone(),
            environment: config.server.environment,
            preprocess: config.preprocess.clone(),
        }
    }

    fn body_limit(&self) -> usize {
        self.preprocess
            .max_upload_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

struct AppState<B> {
    backend: Arc<B>,
    settings: Arc<ServerSettings>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            settings: Arc::clone(&self.settings),
        }
    }
}

/// Build the service router.
///
/// The backend is expected to have been initialised already; a backend that
/// failed to initialise is still served so `/health` can report it. A panic in
/// any handler becomes a 500 response, redacted outside development.
pub fn router<B: PredictionBackend>(backend: Arc<B>, settings: ServerSettings) -> Router {
    let body_limit = settings.body_limit();
    let environment = settings.environment;
    let state = AppState {
        backend,
        settings: Arc::new(settings),
    };
    Router::new()
        .route("/", get(root::<B>))
        .route("/health", get(health::<B>))
        .route("/model-info", get(model_info::<B>))
        .route("/predict", post(predict::<B>))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send>| {
            ApiError::panicked(panic.as_ref(), environment).into_response()
        }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[tracing::instrument(name = "GET /", skip(state))]
async fn root<B: PredictionBackend>(State(state): State<AppState<B>>) -> Json<Value> {
    Json(json!({
        "service": state.settings.service_name,
        "version": state.settings.service_version,
        "status": "running",
        "endpoints": {
            "health": "/health",
            "predict": "/predict",
            "model_info": "/model-info",
        },
    }))
}

async fn health<B: PredictionBackend>(State(state): State<AppState<B>>) -> Json<HealthReport> {
    Json(HealthReport::new(
        state.backend.is_initialized(),
        state.settings.service_version.clone(),
    ))
}

#[tracing::instrument(name = "GET /model-info", skip(state))]
async fn model_info<B: PredictionBackend>(
    State(state): State<AppState<B>>,
) -> Result<Json<ModelInfo>, ApiError> {
    state
        .backend
        .model_info()
        .map(Json)
        .map_err(|err| ApiError::from_predict(&err, state.settings.environment))
}

#[tracing::instrument(name = "POST /predict", skip(state, multipart))]
async fn predict<B: PredictionBackend>(
    State(state): State<AppState<B>>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResult>, ApiError> {
    let environment = state.settings.environment;
    if !state.backend.is_initialized() {
        return Err(ApiError::from_predict(
            &PredictError::NotInitialized,
            environment,
        ));
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_owned();
        if !state.settings.preprocess.accepts_content_type(&content_type) {
            return Err(ApiError::bad_request(format!(
                "Invalid file type: {content_type}. Allowed: {}",
                state.settings.preprocess.allowed_extensions.join(", ")
            )));
        }
        upload = Some(field.bytes().await.map_err(ApiError::multipart)?);
        break;
    }
    let bytes = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let backend = Arc::clone(&state.backend);
    tokio::task::spawn_blocking(move || backend.predict(&bytes))
        .await
        .map_err(|err| ApiError::internal(&err, environment))?
        .map(Json)
        .map_err(|err| ApiError::from_predict(&err, environment))
}

/// JSON error response: `{"error": ..., "detail": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: &'a str,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        warn!(%detail, "bad request");
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Bad request",
            detail,
        }
    }

    fn multipart(err: axum::extract::multipart::MultipartError) -> Self {
        let status = err.status();
        warn!(%status, error = %err, "unreadable upload");
        Self {
            status,
            error: if status == StatusCode::PAYLOAD_TOO_LARGE {
                "Payload too large"
            } else {
                "Bad request"
            },
            detail: err.body_text(),
        }
    }

    fn internal(err: &dyn std::error::Error, environment: Environment) -> Self {
        error!(error = %err, "unhandled failure");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal server error",
            detail: redact(err.to_string(), environment),
        }
    }

    fn panicked(payload: &(dyn Any + Send), environment: Environment) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "request handler panicked".to_owned());
        error!(%detail, "request handler panicked");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal server error",
            detail: redact(detail, environment),
        }
    }

    /// Map a backend failure onto a response by its [`ErrorClass`].
    ///
    /// Server faults only carry their detail in development.
    #[must_use]
    pub fn from_predict(err: &PredictError, environment: Environment) -> Self {
        match err.class() {
            ErrorClass::ClientError => Self::bad_request(err.to_string()),
            ErrorClass::Unavailable => {
                warn!("request refused, model not loaded");
                Self {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    error: "Service unavailable",
                    detail: "Model not loaded. Please ensure the model file is available.".into(),
                }
            }
            ErrorClass::ServerError => {
                error!(error = %err, "prediction failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: "Prediction failed",
                    detail: redact(err.to_string(), environment),
                }
            }
        }
    }
}

fn redact(detail: String, environment: Environment) -> String {
    match environment {
        Environment::Development => detail,
        Environment::Production => GENERIC_DETAIL.into(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            detail: &self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{preprocess::PreprocessError, ranking::RankError};
    use rstest::rstest;

    #[rstest]
    #[case(PredictError::InvalidInput("Empty image payload".into()), StatusCode::BAD_REQUEST)]
    #[case(PredictError::Preprocess(PreprocessError::EmptyImage), StatusCode::BAD_REQUEST)]
    #[case(PredictError::NotInitialized, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(PredictError::Inference("boom".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(
        PredictError::DimensionMismatch(RankError::DimensionMismatch { scores: 2, labels: 3 }),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn maps_error_classes_to_status(#[case] err: PredictError, #[case] expected: StatusCode) {
        assert_eq!(
            ApiError::from_predict(&err, Environment::Development).status(),
            expected
        );
    }

    #[rstest]
    #[case(Environment::Development, "Inference failed: session exploded")]
    #[case(Environment::Production, GENERIC_DETAIL)]
    fn server_fault_detail_depends_on_environment(
        #[case] environment: Environment,
        #[case] expected: &str,
    ) {
        let err = PredictError::Inference("session exploded".into());
        assert_eq!(ApiError::from_predict(&err, environment).detail(), expected);
    }

    #[rstest]
    #[case(Environment::Development, "status lookup exploded")]
    #[case(Environment::Production, GENERIC_DETAIL)]
    fn panic_detail_depends_on_environment(
        #[case] environment: Environment,
        #[case] expected: &str,
    ) {
        let payload: Box<dyn Any + Send> = Box::new(String::from("status lookup exploded"));
        let api = ApiError::panicked(payload.as_ref(), environment);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.detail(), expected);
    }

    #[rstest]
    fn client_errors_keep_their_reason_in_production() {
        let err = PredictError::InvalidInput("Image size exceeds maximum of 10.0MB".into());
        let api = ApiError::from_predict(&err, Environment::Production);
        assert_eq!(api.detail(), "Image size exceeds maximum of 10.0MB");
    }
}
