//! extaudit core - manifest model, rule engine and static scanners
//!
//! This crate holds everything that inspects an unpacked browser extension
//! without running it:
//! - the manifest data model and [`manifest::ManifestStore`]
//! - the [`rules::RuleEngine`] and pure browser-compatibility detection
//! - the independent, read-only static scanners in [`scanners`]
//!
//! Orchestration and scoring live in `extaudit-analysis`.

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::multiple_crate_versions,  // Common in large dependency trees
    clippy::module_name_repetitions,  // Often necessary for clarity
)]

pub mod constants;
pub mod manifest;
pub mod models;
pub mod rules;
pub mod scanners;

pub use manifest::{ManifestError, ManifestStore};
pub use models::{
    BrowserKind, Finding, FindingCategory, ManifestDocument, RiskTier, Severity, Store,
    ValidationResult,
};
pub use rules::{detect_compatibility, RuleEngine};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result type used throughout extaudit core
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for extaudit core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest could not be loaded
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Analysis error
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error
    #[error("Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Browser automation collaborator failed
    #[error("Automation error: {0}")]
    Automation(String),

    /// Utility error
    #[error("Utility error: {0}")]
    Util(#[from] extaudit_utils::UtilError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration shared by the rule engine and every scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Directory names never descended into
    pub excluded_dirs: Vec<String>,
    /// Total size (MB) at which the size scanner warns
    pub size_warn_mb: f64,
    /// Total size (MB) at which the size scanner reports an error
    pub size_fail_mb: f64,
    /// More permissions than this triggers a performance warning
    pub many_permissions_threshold: usize,
    /// Length of the largest-files list
    pub largest_files_reported: usize,
    /// Text scanners skip files bigger than this
    pub max_file_bytes: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: extaudit_utils::default_excluded_dirs(),
            size_warn_mb: constants::SizeThresholds::WARN_MB,
            size_fail_mb: constants::SizeThresholds::FAIL_MB,
            many_permissions_threshold: 10,
            largest_files_reported: 10,
            max_file_bytes: 10 * constants::BYTES_PER_MB,
        }
    }
}

impl CoreConfig {
    /// Load from a TOML/JSON/YAML file, keeping defaults for absent keys
    pub fn load(path: &Path) -> Result<Self> {
        Ok(extaudit_utils::ConfigBuilder::<Self>::new()
            .load_file(path)?
            .build())
    }

    pub fn validate(&self) -> Result<()> {
        if self.size_warn_mb < 0.0 || self.size_fail_mb < self.size_warn_mb {
            return Err(Error::Config(format!(
                "size thresholds must satisfy 0 <= warn ({}) <= fail ({})",
                self.size_warn_mb, self.size_fail_mb
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_thresholds() {
        let config = CoreConfig::default();
        assert!((config.size_warn_mb - 25.0).abs() < f64::EPSILON);
        assert!((config.size_fail_mb - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.many_permissions_threshold, 10);
        assert!(config.excluded_dirs.iter().any(|d| d == ".git"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("core.toml");
        std::fs::write(&path, "size_fail_mb = 40.0\n")?;

        let config = CoreConfig::load(&path)?;
        assert!((config.size_fail_mb - 40.0).abs() < f64::EPSILON);
        assert_eq!(config.largest_files_reported, 10);
        Ok(())
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = CoreConfig {
            size_warn_mb: 60.0,
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
