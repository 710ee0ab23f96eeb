//! Shared fixtures for integration tests.
#![allow(dead_code, reason = "each test crate uses a different subset")]

use std::{fs, io::Cursor, path::Path};

use classify_serve::{
    ClassifierLoader, ImageClassifier, ImageTensor, MockPredictor, Predictor, ServiceConfig,
    config::{ArtifactConfig, MockConfig, PreprocessConfig},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array2, Axis};
use tempfile::TempDir;

pub const PLANT_LABELS: [&str; 13] = [
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

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

#[must_use]
pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

#[must_use]
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, format)
        .unwrap_or_else(|e| panic!("encode test image: {e}"));
    buf.into_inner()
}

/// Overwrite a PNG's compressed pixel data and trailing CRC, keeping the
/// signature and header readable.
///
/// A `fill` byte whose low nibble is not 8 never forms a valid zlib header.
#[must_use]
pub fn corrupt_png_body(png: &[u8], fill: u8) -> Vec<u8> {
    let mut bytes = png.to_vec();
    let data_start = bytes
        .windows(4)
        .position(|window| window == b"IDAT")
        .map_or(bytes.len(), |at| at + 4);
    let iend = bytes.len().saturating_sub(12);
    if let Some(body) = bytes.get_mut(data_start..iend) {
        body.fill(fill);
    }
    bytes
}

#[derive(Debug, thiserror::Error)]
#[error("fixture classifier failure: {0}")]
pub struct FixtureError(pub &'static str);

/// Returns the same scores whatever the input.
#[derive(Debug, Clone)]
pub struct FixedClassifier(pub Vec<f32>);

impl ImageClassifier for FixedClassifier {
    type Error = FixtureError;

    fn classify(&self, _input: &ImageTensor) -> Result<Array2<f32>, Self::Error> {
        Array2::from_shape_vec((1, self.0.len()), self.0.clone())
            .map_err(|_| FixtureError("scores do not form a row"))
    }
}

#[derive(Debug, Clone)]
pub struct FixedLoader(pub Vec<f32>);

impl ClassifierLoader for FixedLoader {
    type Classifier = FixedClassifier;
    type Error = FixtureError;

    fn load(&self, _path: &Path) -> Result<Self::Classifier, Self::Error> {
        Ok(FixedClassifier(self.0.clone()))
    }
}

/// Scores an image by its mean red, green and blue intensity.
///
/// A solid red image wins class 0, green class 1 and blue class 2, which makes
/// cross-request contamination visible.
#[derive(Debug, Clone, Copy)]
pub struct ChannelMeanClassifier;

impl ImageClassifier for ChannelMeanClassifier {
    type Error = FixtureError;

    fn classify(&self, input: &ImageTensor) -> Result<Array2<f32>, Self::Error> {
        let flat = input
            .as_array()
            .view()
            .into_shape_with_order((input.shape().iter().take(3).product::<usize>(), 3))
            .map_err(|_| FixtureError("tensor is not NHWC"))?;
        let means = flat
            .mean_axis(Axis(0))
            .ok_or(FixtureError("empty tensor"))?;
        Ok(means.insert_axis(Axis(0)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelMeanLoader;

impl ClassifierLoader for ChannelMeanLoader {
    type Classifier = ChannelMeanClassifier;
    type Error = FixtureError;

    fn load(&self, _path: &Path) -> Result<Self::Classifier, Self::Error> {
        Ok(ChannelMeanClassifier)
    }
}

/// Temporary model directory holding a placeholder model and a label list.
pub struct ModelDir {
    pub dir: TempDir,
    pub config: ServiceConfig,
}

impl ModelDir {
    #[must_use]
    pub fn new(labels: &[&str], image_size: u32) -> Self {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("create temp dir: {e}"));
        let model_path = dir.path().join("model.onnx");
        fs::write(&model_path, b"placeholder weights")
            .unwrap_or_else(|e| panic!("write model: {e}"));
        let labels_path = dir.path().join("class_labels.json");
        let json = serde_json::to_string(labels).unwrap_or_else(|e| panic!("labels json: {e}"));
        fs::write(&labels_path, json).unwrap_or_else(|e| panic!("write labels: {e}"));

        let config = ServiceConfig {
            artifact: ArtifactConfig {
                model_path,
                labels_path,
                ..ArtifactConfig::default()
            },
            preprocess: PreprocessConfig {
                image_size,
                ..PreprocessConfig::default()
            },
            mock: MockConfig {
                min_latency_ms: 0,
                max_latency_ms: 0,
                seed: Some(7),
            },
            ..ServiceConfig::default()
        };
        Self { dir, config }
    }

    /// Point the store at a model file that does not exist.
    #[must_use]
    pub fn without_model(mut self) -> Self {
        self.config.artifact.model_path = self.dir.path().join("missing.onnx");
        self
    }

    #[must_use]
    pub fn predictor<L: ClassifierLoader>(&self, loader: L) -> Predictor<L> {
        Predictor::from_config(loader, &self.config)
    }

    #[must_use]
    pub fn mock(&self) -> MockPredictor {
        MockPredictor::from_config(&self.config)
    }
}
