//! Loading the manifest document from an extension root

use crate::constants::MANIFEST_FILE;
use crate::models::ManifestDocument;
use std::path::{Path, PathBuf};

/// Why a manifest could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest.json not found in extension root")]
    NotFound(PathBuf),

    #[error("Error reading manifest.json: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in manifest.json: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("manifest.json must contain a JSON object")]
    NotAnObject,
}

impl ManifestError {
    /// Stable finding code for this failure
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "manifest-not-found",
            Self::Unreadable { .. } => "manifest-unreadable",
            Self::InvalidJson(_) => "manifest-invalid-json",
            Self::NotAnObject => "manifest-not-object",
        }
    }
}

/// Reads `<root>/manifest.json`
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Load and parse the manifest
    pub fn load(&self) -> Result<ManifestDocument, ManifestError> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Err(ManifestError::NotFound(path));
        }

        let content = std::fs::read(&path).map_err(|source| ManifestError::Unreadable {
            path: path.clone(),
            source,
        })?;

        // Tolerate a UTF-8 byte order mark
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&content);

        let raw: serde_json::Value =
            serde_json::from_slice(content).map_err(ManifestError::InvalidJson)?;
        ManifestDocument::from_value(raw)
    }

    /// Load, logging and discarding any failure. For scanners that only
    /// need the manifest opportunistically.
    pub fn load_lenient(&self) -> Option<ManifestDocument> {
        match self.load() {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::debug!("Manifest unavailable under {}: {}", self.root.display(), e);
                None
            }
        }
    }
}
