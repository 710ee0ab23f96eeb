//! Upload validation and image-to-tensor conversion.
//!
//! Validation sniffs the format and decodes the whole image, so anything it
//! accepts is known to convert. Conversion normalises the decoded image to
//! 8-bit RGB, resizes it to the square model input and rescales intensities
//! to `[0, 1]`:
//!
//! - greyscale sample `v` becomes `(v, v, v)`;
//! - alpha is discarded without compositing;
//! - 16-bit and float images are scaled to 8 bits first.

use std::{fmt, io::Cursor};

use image::{DynamicImage, ImageReader, RgbImage, imageops};
use ndarray::{Array4, ArrayView4};
use thiserror::Error;
use tracing::debug;

use crate::config::PreprocessConfig;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Errors returned by [`ImagePreprocessor::preprocess`].
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to read image: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("decoded image has zero width or height")]
    EmptyImage,
    #[error("failed to build input tensor: {0}")]
    Shape(#[source] ndarray::ShapeError),
}

/// Batched model input of shape `(1, height, width, 3)` with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    /// An all-black tensor for a `size x size` input.
    #[must_use]
    pub fn zeros(size: u32) -> Self {
        let side = size as usize;
        Self(Array4::zeros((1, side, side, 3)))
    }

    /// Tensor dimensions, `[1, height, width, 3]`.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Borrowed view, as fed to the inference engine.
    #[must_use]
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    /// The underlying array.
    #[must_use]
    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }
}

/// Outcome of [`ImagePreprocessor::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub accepted: bool,
    /// Human-readable rejection reason; empty when accepted.
    pub reason: String,
}

impl Validation {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: String::new(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

/// Validates uploads and converts them into model input tensors.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    #[must_use]
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Check that an upload is a decodable image of an allowed format.
    ///
    /// # Examples
    ///
    /// ```
    /// use classify_serve::preprocess::ImagePreprocessor;
    ///
    /// let check = ImagePreprocessor::default().validate(b"definitely not an image");
    /// assert!(!check.accepted);
    /// assert!(!check.reason.is_empty());
    /// ```
    #[must_use]
    pub fn validate(&self, bytes: &[u8]) -> Validation {
        match self.admit(bytes) {
            Ok(_) => Validation::accept(),
            Err(rejection) => rejection,
        }
    }

    /// Validate an upload and hand back the decoded image.
    ///
    /// Applies the same checks as [`Self::validate`] and decodes the pixels
    /// once, under the reader's default allocation limits.
    ///
    /// # Errors
    ///
    /// Returns the rejecting [`Validation`] when the upload is empty, too
    /// large, of a disallowed format or not decodable.
    pub fn admit(&self, bytes: &[u8]) -> Result<DynamicImage, Validation> {
        if bytes.is_empty() {
            return Err(Validation::reject("Empty image payload"));
        }
        if bytes.len() > self.config.max_upload_bytes {
            #[expect(
                clippy::cast_precision_loss,
                clippy::float_arithmetic,
                reason = "human-readable size"
            )]
            let limit_mb = self.config.max_upload_bytes as f64 / BYTES_PER_MIB;
            return Err(Validation::reject(format!(
                "Image size exceeds maximum of {limit_mb:.1}MB"
            )));
        }
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(invalid_image)?;
        let Some(format) = reader.format() else {
            return Err(Validation::reject(
                "Invalid image file: unrecognised image format",
            ));
        };
        if !format
            .extensions_str()
            .iter()
            .any(|ext| self.config.allows_extension(ext))
        {
            return Err(Validation::reject(format!(
                "Unsupported image format: {format:?}. Allowed: {}",
                self.config.allowed_extensions.join(", ")
            )));
        }
        let image = reader.decode().map_err(invalid_image)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(Validation::reject("Invalid image file: zero-sized image"));
        }
        debug!(
            ?format,
            width = image.width(),
            height = image.height(),
            "image validated"
        );
        Ok(image)
    }

    /// Decode an upload into a `(1, D, D, 3)` tensor.
    ///
    /// # Errors
    ///
    /// Returns a [`PreprocessError`] when the bytes cannot be decoded or the
    /// decoded image is empty.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<ImageTensor, PreprocessError> {
        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(PreprocessError::Read)?
            .decode()
            .map_err(PreprocessError::Decode)?;
        self.preprocess_image(image)
    }

    /// Convert an already decoded image into a `(1, D, D, 3)` tensor.
    ///
    /// # Errors
    ///
    /// Returns [`PreprocessError::EmptyImage`] for a zero-sized image.
    pub fn preprocess_image(&self, image: DynamicImage) -> Result<ImageTensor, PreprocessError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PreprocessError::EmptyImage);
        }
        let rgb = to_rgb(image);
        let size = self.config.image_size;
        let resized = if rgb.dimensions() == (size, size) {
            rgb
        } else {
            imageops::resize(&rgb, size, size, self.config.resize_filter.filter_type())
        };
        let side = size as usize;
        let data: Vec<f32> = resized.into_raw().into_iter().map(unit_intensity).collect();
        let array =
            Array4::from_shape_vec((1, side, side, 3), data).map_err(PreprocessError::Shape)?;
        Ok(ImageTensor(array))
    }
}

fn invalid_image(err: impl fmt::Display) -> Validation {
    Validation::reject(format!("Invalid image file: {err}"))
}

fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            debug!(colour = ?other.color(), "converting image to RGB");
            other.to_rgb8()
        }
    }
}

#[expect(clippy::float_arithmetic, reason = "intensity rescaling")]
fn unit_intensity(value: u8) -> f32 {
    f32::from(value) / 255.0
}
