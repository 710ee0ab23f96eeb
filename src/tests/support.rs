//! Fixtures for unit tests: image encoding, stub classifiers and label files.

use std::{
    fs,
    io::Cursor,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array2;
use tempfile::TempDir;
use thiserror::Error;

use crate::{
    preprocess::ImageTensor,
    providers::{ClassifierLoader, ImageClassifier},
};

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

#[expect(clippy::expect_used, reason = "test should fail loudly")]
#[must_use]
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).expect("encode test image");
    buf.into_inner()
}

#[must_use]
pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
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

#[expect(clippy::expect_used, reason = "test should fail loudly")]
pub fn write_labels(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write label file");
    path
}

#[derive(Debug, Error)]
#[error("stub failure: {0}")]
pub struct StubError(pub &'static str);

/// Returns the same scores for every input.
#[derive(Debug, Clone)]
pub struct StubClassifier {
    scores: Vec<f32>,
}

impl ImageClassifier for StubClassifier {
    type Error = StubError;

    fn classify(&self, _input: &ImageTensor) -> Result<Array2<f32>, Self::Error> {
        Array2::from_shape_vec((1, self.scores.len()), self.scores.clone())
            .map_err(|_| StubError("scores do not form a row"))
    }
}

/// Hands out [`StubClassifier`]s and counts how often it was asked to.
#[derive(Debug, Clone)]
pub struct StubLoader {
    scores: Vec<f32>,
    fail: bool,
    loads: Arc<AtomicUsize>,
}

impl StubLoader {
    #[must_use]
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            fail: false,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ClassifierLoader for StubLoader {
    type Classifier = StubClassifier;
    type Error = StubError;

    fn load(&self, _path: &std::path::Path) -> Result<Self::Classifier, Self::Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StubError("corrupt model"));
        }
        Ok(StubClassifier {
            scores: self.scores.clone(),
        })
    }
}
