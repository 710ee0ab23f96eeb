use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors produced while verifying an artefact on disk.
#[derive(Debug, Error)]
pub enum ArtefactError {
    #[error("failed to read artefact at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artefact at {path} expected SHA-256 {expected} but found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// File-based artefact, optionally pinned to a recorded checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artefact {
    /// Location of the artefact on disk.
    pub path: PathBuf,
    /// Expected SHA-256 checksum expressed as hexadecimal. Verification is
    /// skipped when unset.
    pub sha256: Option<String>,
}

impl Artefact {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, sha256: Option<String>) -> Self {
        Self {
            path: path.into(),
            sha256,
        }
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Compare the file's digest with the pinned one, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::ChecksumMismatch`] on a differing digest and
    /// [`ArtefactError::Io`] when the file cannot be read.
    pub fn verify(&self) -> Result<(), ArtefactError> {
        let Some(expected) = self.sha256.as_deref().map(normalise_hex) else {
            return Ok(());
        };
        let actual = compute_sha256(&self.path)?;
        if actual == expected {
            Ok(())
        } else {
            Err(ArtefactError::ChecksumMismatch {
                path: self.path.clone(),
                expected,
                actual,
            })
        }
    }
}

/// Hex-encoded SHA-256 digest of the file at `path`, streamed from disk.
///
/// # Errors
///
/// Returns [`ArtefactError::Io`] when the file cannot be opened or read.
pub fn compute_sha256(path: &Path) -> Result<String, ArtefactError> {
    let io_error = |source| ArtefactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(io_error)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Lower-case, whitespace-trimmed form of a hex digest.
pub fn normalise_hex(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
