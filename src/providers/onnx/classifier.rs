use std::{path::Path, sync::Mutex};

use ndarray::Array2;
use ort::{session::Session, value::TensorRef};
use tracing::debug;

use super::{config::OnnxClassifierConfig, errors::OnnxClassifierError};
use crate::preprocess::ImageTensor;

/// Image classifier evaluated by ONNX Runtime.
///
/// `ort` needs exclusive access to run a session, so evaluations are
/// serialised behind a mutex. Preprocessing happens outside the lock.
#[derive(Debug)]
pub struct OnnxImageClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxImageClassifier {
    /// Builds a classifier from an ONNX graph on disk.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when the session cannot be created or the graph
    /// declares no inputs or outputs.
    pub fn new(path: &Path, config: &OnnxClassifierConfig) -> Result<Self, OnnxClassifierError> {
        let mut builder = Session::builder().map_err(OnnxClassifierError::CreateSessionBuilder)?;
        if let Some(threads) = config.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(OnnxClassifierError::ConfigureSession)?;
        }
        let session =
            builder
                .commit_from_file(path)
                .map_err(|source| OnnxClassifierError::CreateSession {
                    path: path.to_path_buf(),
                    source,
                })?;

        let input_name = match &config.input_name {
            Some(name) => name.clone(),
            None => session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or(OnnxClassifierError::MissingInputNames)?,
        };
        let output_name = match &config.output_name {
            Some(name) => name.clone(),
            None => session
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or(OnnxClassifierError::MissingOutputNames)?,
        };
        debug!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            "ONNX session created"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Runs a forward pass and returns the scores as `(batch, classes)`.
    ///
    /// # Errors
    ///
    /// Returns tensor conversion, inference or output-shape errors.
    pub fn predict(&self, input: &ImageTensor) -> Result<Array2<f32>, OnnxClassifierError> {
        let tensor =
            TensorRef::from_array_view(input.view()).map_err(OnnxClassifierError::EncodeTensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| OnnxClassifierError::SessionPoisoned)?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(OnnxClassifierError::Inference)?;

        let scores = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            OnnxClassifierError::OutputMissing {
                name: self.output_name.clone(),
            }
        })?;
        let (shape, data) = scores
            .try_extract_tensor::<f32>()
            .map_err(OnnxClassifierError::Inference)?;
        batch_matrix(&self.output_name, shape, data)
    }
}

/// Reshape a raw output into `(batch, classes)`, folding trailing unit axes.
fn batch_matrix(
    name: &str,
    dims: &[i64],
    data: &[f32],
) -> Result<Array2<f32>, OnnxClassifierError> {
    let shape_error = || OnnxClassifierError::OutputShape {
        name: name.to_owned(),
        shape: dims.to_vec(),
    };
    let (&rows, rest) = dims.split_first().ok_or_else(shape_error)?;
    let rows = usize::try_from(rows).map_err(|_| shape_error())?;
    let cols = rest
        .iter()
        .try_fold(1_usize, |acc, &dim| {
            usize::try_from(dim).ok().and_then(|dim| acc.checked_mul(dim))
        })
        .ok_or_else(shape_error)?;
    Array2::from_shape_vec((rows, cols), data.to_vec()).map_err(OnnxClassifierError::Reshape)
}
