use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the ONNX image classifier.
#[derive(Debug, Error)]
pub enum OnnxClassifierError {
    #[error("failed to construct ONNX session builder: {0}")]
    CreateSessionBuilder(#[source] ort::Error),
    #[error("failed to configure ONNX session: {0}")]
    ConfigureSession(#[source] ort::Error),
    #[error("failed to create ONNX session from {path}: {source}")]
    CreateSession {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },
    #[error("ONNX graph declares no inputs")]
    MissingInputNames,
    #[error("ONNX graph declares no outputs")]
    MissingOutputNames,
    #[error("failed to convert image into tensor: {0}")]
    EncodeTensor(#[source] ort::Error),
    #[error("session mutex was poisoned by a previous panic")]
    SessionPoisoned,
    #[error("failed to run inference: {0}")]
    Inference(#[source] ort::Error),
    #[error("ONNX output \"{name}\" missing from session results")]
    OutputMissing { name: String },
    #[error("ONNX output \"{name}\" has unsupported shape {shape:?}")]
    OutputShape { name: String, shape: Vec<i64> },
    #[error("failed to reshape ONNX output: {0}")]
    Reshape(#[source] ndarray::ShapeError),
}
