//! Service configuration types and validation.
//!
//! [`ServiceConfig`] is the validated form every component is built from. The
//! `classifyd` binary assembles it from CLI flags, environment variables and
//! an optional TOML file (see [`crate::cli`]).

use std::{fmt, path::PathBuf, str::FromStr};

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Default square input dimension for MobileNet-style models.
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Errors raised while validating configuration.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("unknown backend \"{0}\" (expected \"onnx\" or \"mock\")")]
    UnknownBackend(String),
    #[error("unknown environment \"{0}\" (expected \"development\" or \"production\")")]
    UnknownEnvironment(String),
    #[error(
        "unknown resize filter \"{0}\" (expected \"lanczos3\", \"catmull_rom\", \"gaussian\" or \"triangle\")"
    )]
    UnknownResizeFilter(String),
    #[error("unknown log level \"{0}\"")]
    UnknownLogLevel(String),
    #[error("image_size must be greater than 0")]
    ZeroImageSize,
    #[error("max_upload_bytes must be greater than 0")]
    ZeroUploadLimit,
    #[error("allowed_extensions must list at least one extension")]
    NoExtensions,
    #[error("workers must be greater than 0")]
    ZeroWorkers,
    #[error("mock latency range {min_ms}..={max_ms} ms is empty")]
    InvalidLatency { min_ms: u64, max_ms: u64 },
}

/// Which prediction backend the service binds at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// ONNX Runtime inference over a trained artifact.
    #[default]
    Onnx,
    /// Simulated predictions; needs no artifact.
    Mock,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "mock" => Ok(Self::Mock),
            _ => Err(ConfigError::UnknownBackend(s.to_owned())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Onnx => "onnx",
            Self::Mock => "mock",
        })
    }
}

/// Deployment environment. Controls how much error detail callers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_owned())),
        }
    }
}

/// Smooth resampling kernels accepted for preprocessing.
///
/// Nearest-neighbour is not offered. The default, Lanczos3, matches the
/// filter used to resize the training images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    #[default]
    Lanczos3,
    CatmullRom,
    Gaussian,
    Triangle,
}

impl ResizeFilter {
    #[must_use]
    pub fn filter_type(self) -> FilterType {
        match self {
            Self::Lanczos3 => FilterType::Lanczos3,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Triangle => FilterType::Triangle,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            "catmull_rom" | "bicubic" => Ok(Self::CatmullRom),
            "gaussian" => Ok(Self::Gaussian),
            "triangle" | "bilinear" => Ok(Self::Triangle),
            _ => Err(ConfigError::UnknownResizeFilter(s.to_owned())),
        }
    }
}

/// Upload validation and tensor conversion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PreprocessConfig {
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
    /// Lower-case file extensions of accepted image formats.
    pub allowed_extensions: Vec<String>,
    /// Side length of the square model input.
    pub image_size: u32,
    pub resize_filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            image_size: DEFAULT_IMAGE_SIZE,
            resize_filter: ResizeFilter::default(),
        }
    }
}

impl PreprocessConfig {
    /// Whether `extension` (without the dot, any case) is accepted.
    #[must_use]
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    /// Whether a declared upload MIME type maps onto an allowed extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use classify_serve::config::PreprocessConfig;
    ///
    /// let cfg = PreprocessConfig::default();
    /// assert!(cfg.accepts_content_type("image/jpeg"));
    /// assert!(cfg.accepts_content_type("image/jpg"));
    /// assert!(!cfg.accepts_content_type("image/gif"));
    /// ```
    #[must_use]
    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let Some(subtype) = essence.strip_prefix("image/") else {
            return false;
        };
        match subtype {
            "jpeg" | "jpg" | "pjpeg" => self.allows_extension("jpg") || self.allows_extension("jpeg"),
            "x-ms-bmp" => self.allows_extension("bmp"),
            other => self.allows_extension(other),
        }
    }
}

/// Location and identity of the trained artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ArtifactConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    /// Expected SHA-256 of the model file; verification is skipped when unset.
    pub model_sha256: Option<String>,
    /// Architecture name reported by `model_info`.
    pub model_name: String,
    /// Version tag reported by `model_info`.
    pub model_version: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.onnx"),
            labels_path: PathBuf::from("models/class_labels.json"),
            model_sha256: None,
            model_name: "MobileNetV2".into(),
            model_version: "1.0.0".into(),
        }
    }
}

/// Tuning for the simulated backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MockConfig {
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: 50,
            max_latency_ms: 150,
            seed: None,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Runtime worker threads.
    pub workers: usize,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            workers: 1,
            environment: Environment::default(),
            service_name: "classify-serve".into(),
            service_version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Complete, validated service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServiceConfig {
    pub backend: BackendKind,
    pub artifact: ArtifactConfig,
    pub preprocess: PreprocessConfig,
    pub mock: MockConfig,
    pub server: ServerConfig,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            artifact: ArtifactConfig::default(),
            preprocess: PreprocessConfig::default(),
            mock: MockConfig::default(),
            server: ServerConfig::default(),
            log_level: "info".into(),
        }
    }
}

impl ServiceConfig {
    /// Ensure the configuration values are within acceptable bounds.
    ///
    /// Extensions are normalised to lower case without a leading dot and the
    /// log level is lower-cased.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.preprocess.image_size == 0 {
            return Err(ConfigError::ZeroImageSize);
        }
        if self.preprocess.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        self.preprocess.allowed_extensions = self
            .preprocess
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if self.preprocess.allowed_extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        if self.server.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.mock.min_latency_ms > self.mock.max_latency_ms {
            return Err(ConfigError::InvalidLatency {
                min_ms: self.mock.min_latency_ms,
                max_ms: self.mock.max_latency_ms,
            });
        }
        if self.log_level.trim().is_empty() {
            self.log_level = "info".into();
        }
        let level = self.log_level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::UnknownLogLevel(self.log_level));
        }
        self.log_level = level;
        Ok(self)
    }
}
