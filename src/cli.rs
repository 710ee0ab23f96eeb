//! CLI argument types and layered configuration for the `classifyd` binary.
//! Loads from CLI args, environment (prefix `CLASSIFYD_`), and an optional
//! TOML config file.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use ortho_config::OrthoError;
use serde::Deserialize;
use std::path::PathBuf;

use crate::config::{ConfigError, ServiceConfig};

const ENV_PREFIX: &str = "CLASSIFYD_";

/// Command-line arguments for the `classifyd` binary.
///
/// Every setting is optional; anything left unset falls back to the
/// [`ServiceConfig`] default. Values are loaded from command-line flags,
/// environment variables prefixed with `CLASSIFYD_`, and an optional
/// configuration file, in that order of precedence.
///
/// # Examples
///
/// Parse flags directly:
/// ```
/// use classify_serve::cli::ClassifydArgs;
/// use ortho_config::OrthoConfig;
///
/// let args = ClassifydArgs::load_from_iter(["classifyd", "--port", "9000", "--check=true"])
///     .expect("load args from CLI iterator");
/// assert_eq!(args.port, Some(9000));
/// assert!(args.check);
/// ```
///
/// Load from a configuration file:
/// ```
/// use classify_serve::cli::ClassifydArgs;
/// use ortho_config::OrthoConfig;
/// use std::io::Write;
/// use tempfile::NamedTempFile;
///
/// let mut file = NamedTempFile::new().expect("create temp file");
/// writeln!(file, "backend = \"mock\"").expect("write config");
/// let path = file.path().to_str().expect("path str");
/// let args = ClassifydArgs::load_from_iter(["classifyd", "--config-path", path])
///     .expect("load args from config path");
/// assert_eq!(args.backend.as_deref(), Some("mock"));
/// ```
#[derive(Debug, Default, Deserialize, ortho_config::OrthoConfig)]
#[ortho_config(prefix = "CLASSIFYD")]
pub struct ClassifydArgs {
    /// Prediction backend: `onnx` or `mock`.
    pub backend: Option<String>,
    /// Path to the ONNX model file.
    pub model_path: Option<PathBuf>,
    /// Path to the class label list (`.json` array or `.txt`).
    pub labels_path: Option<PathBuf>,
    /// Expected SHA-256 of the model file.
    pub model_sha256: Option<String>,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: Option<usize>,
    /// Comma-separated list of accepted extensions.
    pub allowed_extensions: Option<String>,
    /// Side length of the square model input.
    pub image_size: Option<u32>,
    pub resize_filter: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Runtime worker threads.
    pub workers: Option<usize>,
    /// `development` or `production`.
    pub environment: Option<String>,
    pub log_level: Option<String>,
    pub mock_min_latency_ms: Option<u64>,
    pub mock_max_latency_ms: Option<u64>,
    pub mock_seed: Option<u64>,

    /// Initialise the backend, print its health and exit.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub check: bool,

    /// Optional path to a configuration file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl ClassifydArgs {
    /// Load configuration solely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if any variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if the file cannot be read or parsed.
    pub fn load_from_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from environment variables and a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if either source contains invalid values.
    pub fn load_from_env_and_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Into::into)
    }

    /// Overlay the supplied values on the defaults and validate the result.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a value does not parse or fails
    /// [`ServiceConfig::validate`].
    pub fn to_config(&self) -> Result<ServiceConfig, ConfigError> {
        let mut cfg = ServiceConfig::default();

        if let Some(backend) = &self.backend {
            cfg.backend = backend.parse()?;
        }
        overlay(&mut cfg.artifact.model_path, self.model_path.as_ref());
        overlay(&mut cfg.artifact.labels_path, self.labels_path.as_ref());
        if let Some(digest) = &self.model_sha256 {
            cfg.artifact.model_sha256 = Some(digest.clone());
        }
        overlay(&mut cfg.artifact.model_name, self.model_name.as_ref());
        overlay(&mut cfg.artifact.model_version, self.model_version.as_ref());

        overlay(&mut cfg.preprocess.max_upload_bytes, self.max_upload_bytes.as_ref());
        if let Some(list) = &self.allowed_extensions {
            cfg.preprocess.allowed_extensions = list.split(',').map(str::to_owned).collect();
        }
        overlay(&mut cfg.preprocess.image_size, self.image_size.as_ref());
        if let Some(filter) = &self.resize_filter {
            cfg.preprocess.resize_filter = filter.parse()?;
        }

        overlay(&mut cfg.server.host, self.host.as_ref());
        overlay(&mut cfg.server.port, self.port.as_ref());
        overlay(&mut cfg.server.workers, self.workers.as_ref());
        if let Some(environment) = &self.environment {
            cfg.server.environment = environment.parse()?;
        }
        if let Some(level) = &self.log_level {
            cfg.log_level.clone_from(level);
        }

        overlay(&mut cfg.mock.min_latency_ms, self.mock_min_latency_ms.as_ref());
        overlay(&mut cfg.mock.max_latency_ms, self.mock_max_latency_ms.as_ref());
        if let Some(seed) = self.mock_seed {
            cfg.mock.seed = Some(seed);
        }

        cfg.validate()
    }
}

fn overlay<T: Clone>(slot: &mut T, value: Option<&T>) {
    if let Some(value) = value {
        slot.clone_from(value);
    }
}
