//! Loads the trained classifier and its label list once and keeps them.
//!
//! The first successful [`ArtifactStore::load`] pins both in memory for the
//! lifetime of the store; later calls return the cached pair without touching
//! storage. Failed loads cache nothing, so a later call retries from scratch.

use std::{
    error::Error as StdError,
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::ModelInfo,
    config::ArtifactConfig,
    preprocess::ImageTensor,
    providers::{
        ClassifierLoader, ImageClassifier,
        artefact::{Artefact, ArtefactError},
    },
};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors produced while loading the artifact and its labels.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model file not found at {path}")]
    ArtifactNotFound { path: PathBuf },
    #[error(transparent)]
    Checksum(#[from] ArtefactError),
    #[error("failed to load model from {path}: {source}")]
    ArtifactLoadError {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("class labels file not found at {path}")]
    LabelListNotFound { path: PathBuf },
    #[error("class labels file {path} is malformed: {reason}")]
    LabelListMalformed { path: PathBuf, reason: String },
    #[error("label list has {labels} entries but the model emits {outputs} scores")]
    LabelCountMismatch { labels: usize, outputs: usize },
    #[error("artifact store lock was poisoned by a previous panic")]
    Poisoned,
    #[error("model not loaded")]
    NotLoaded,
}

/// Ordered class names, aligned with the classifier's output positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelList(Vec<String>);

impl LabelList {
    /// Wrap a non-empty list of non-blank names.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the list is empty or contains a
    /// blank name.
    pub fn new(labels: Vec<String>) -> Result<Self, String> {
        if labels.is_empty() {
            return Err("label list is empty".into());
        }
        if let Some(position) = labels.iter().position(|l| l.trim().is_empty()) {
            return Err(format!("label {position} is blank"));
        }
        Ok(Self(labels))
    }

    /// Read a label list from disk.
    ///
    /// `.txt` files hold one label per line; everything else must be a JSON
    /// array of strings.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::LabelListNotFound`] when the file is missing
    /// and [`ArtifactError::LabelListMalformed`] when it cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        if !path.is_file() {
            return Err(ArtifactError::LabelListNotFound {
                path: path.to_path_buf(),
            });
        }
        let malformed = |reason: String| ArtifactError::LabelListMalformed {
            path: path.to_path_buf(),
            reason,
        };
        let raw = fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let is_text = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        let labels = if is_text {
            parse_text_labels(&raw)
        } else {
            serde_json::from_str::<Vec<String>>(&raw).map_err(|e| malformed(e.to_string()))?
        };
        Self::new(labels).map_err(malformed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

fn parse_text_labels(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// A loaded classifier together with its labels.
#[derive(Debug)]
pub struct LoadedArtifact<C> {
    pub classifier: C,
    pub labels: LabelList,
}

/// Owns the classifier artifact for the lifetime of the service.
pub struct ArtifactStore<L: ClassifierLoader> {
    loader: L,
    config: ArtifactConfig,
    image_size: u32,
    cache: OnceLock<Arc<LoadedArtifact<L::Classifier>>>,
    load_lock: Mutex<()>,
}

impl<L: ClassifierLoader> fmt::Debug for ArtifactStore<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("config", &self.config)
            .field("image_size", &self.image_size)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl<L: ClassifierLoader> ArtifactStore<L> {
    /// `image_size` is the square input dimension used for the probe pass and
    /// reported by [`Self::model_info`].
    #[must_use]
    pub fn new(loader: L, config: ArtifactConfig, image_size: u32) -> Self {
        Self {
            loader,
            config,
            image_size,
            cache: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Load the artifact and labels, or return the cached pair.
    ///
    /// # Errors
    ///
    /// Returns an [`ArtifactError`] describing which step failed.
    pub fn load(&self) -> Result<Arc<LoadedArtifact<L::Classifier>>, ArtifactError> {
        if let Some(loaded) = self.cache.get() {
            return Ok(Arc::clone(loaded));
        }
        let _guard = self.load_lock.lock().map_err(|_| ArtifactError::Poisoned)?;
        if let Some(loaded) = self.cache.get() {
            return Ok(Arc::clone(loaded));
        }
        let loaded = Arc::new(self.load_uncached()?);
        info!(
            path = %self.config.model_path.display(),
            classes = loaded.labels.len(),
            "model artifact loaded"
        );
        Ok(Arc::clone(self.cache.get_or_init(|| loaded)))
    }

    fn load_uncached(&self) -> Result<LoadedArtifact<L::Classifier>, ArtifactError> {
        let model_path = &self.config.model_path;
        let artefact = Artefact::new(model_path.clone(), self.config.model_sha256.clone());
        if !artefact.exists() {
            warn!(path = %model_path.display(), "model file missing");
            return Err(ArtifactError::ArtifactNotFound {
                path: model_path.clone(),
            });
        }
        artefact.verify()?;

        let labels = LabelList::from_file(&self.config.labels_path)?;
        info!(count = labels.len(), "class labels loaded");

        let load_error = |source: BoxError| ArtifactError::ArtifactLoadError {
            path: model_path.clone(),
            source,
        };
        let classifier = self
            .loader
            .load(model_path)
            .map_err(|e| load_error(Box::new(e)))?;

        let probe = classifier
            .classify(&ImageTensor::zeros(self.image_size))
            .map_err(|e| load_error(Box::new(e)))?;
        let outputs = probe.ncols();
        if outputs != labels.len() {
            return Err(ArtifactError::LabelCountMismatch {
                labels: labels.len(),
                outputs,
            });
        }

        Ok(LoadedArtifact { classifier, labels })
    }

    /// Describe the loaded model.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::NotLoaded`] before a successful [`Self::load`].
    pub fn model_info(&self) -> Result<ModelInfo, ArtifactError> {
        let loaded = self.cache.get().ok_or(ArtifactError::NotLoaded)?;
        let side = self.image_size as usize;
        Ok(ModelInfo {
            model_name: self.config.model_name.clone(),
            model_version: self.config.model_version.clone(),
            num_classes: loaded.labels.len(),
            classes: loaded.labels.as_slice().to_vec(),
            input_shape: vec![side, side, 3],
        })
    }
}
