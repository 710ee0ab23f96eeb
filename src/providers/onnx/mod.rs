//! ONNX Runtime backed image classifier.
//!
//! # Examples
//! ```no_run
//! use classify_serve::providers::{ClassifierLoader, ImageClassifier};
//! use classify_serve::providers::onnx::{OnnxClassifierConfig, OnnxLoader};
//! use classify_serve::preprocess::ImageTensor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = OnnxLoader::new(OnnxClassifierConfig::default());
//! let classifier = loader.load(std::path::Path::new("/models/mobilenet_v2.onnx"))?;
//! let scores = classifier.classify(&ImageTensor::zeros(224))?;
//! # println!("{scores:?}");
//! # Ok(())
//! # }
//! ```
mod classifier;
mod config;
mod errors;

use std::path::Path;

use ndarray::Array2;

pub use classifier::OnnxImageClassifier;
pub use config::OnnxClassifierConfig;
pub use errors::OnnxClassifierError;

use crate::{
    preprocess::ImageTensor,
    providers::{ClassifierLoader, ImageClassifier},
};

impl ImageClassifier for OnnxImageClassifier {
    type Error = OnnxClassifierError;

    fn classify(&self, input: &ImageTensor) -> Result<Array2<f32>, Self::Error> {
        self.predict(input)
    }
}

/// Loads `.onnx` graphs into [`OnnxImageClassifier`]s.
#[derive(Debug, Clone, Default)]
pub struct OnnxLoader {
    config: OnnxClassifierConfig,
}

impl OnnxLoader {
    #[must_use]
    pub fn new(config: OnnxClassifierConfig) -> Self {
        Self { config }
    }
}

impl ClassifierLoader for OnnxLoader {
    type Classifier = OnnxImageClassifier;
    type Error = OnnxClassifierError;

    fn load(&self, path: &Path) -> Result<Self::Classifier, Self::Error> {
        OnnxImageClassifier::new(path, &self.config)
    }
}
