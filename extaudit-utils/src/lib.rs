//! extaudit utilities
//!
//! Shared plumbing for the extaudit crates: logging bootstrap and named
//! loggers, layered configuration loading, and path helpers that keep
//! manifest-referenced paths inside the extension root.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod config;
pub mod file;
pub mod logging;

pub use config::{load_config, merge_configs, ConfigBuilder};
pub use file::{normalize_path, relative_display, safe_path_join};

/// Result type used throughout the extaudit utilities
pub type Result<T> = std::result::Result<T, UtilError>;

/// Error types for utility operations
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path operation error
    #[error("Path operation error: {0}")]
    PathOperation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Directory names that are never descended into when walking an extension
pub fn default_excluded_dirs() -> Vec<String> {
    [
        ".git",
        ".svn",
        ".hg",
        "node_modules",
        ".runtime_profile",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Check whether any normal component of `path` is one of `excluded`
pub fn is_excluded_path(path: &std::path::Path, excluded: &[String]) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => name
            .to_str()
            .map_or(false, |name| excluded.iter().any(|e| e == name)),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_excluded_components() {
        let excluded = default_excluded_dirs();

        assert!(is_excluded_path(&PathBuf::from("ext/.git/config"), &excluded));
        assert!(is_excluded_path(&PathBuf::from("node_modules/jquery/jquery.js"), &excluded));
        assert!(!is_excluded_path(&PathBuf::from("src/git_helper.js"), &excluded));
    }

    #[test]
    fn test_custom_exclusions() {
        let excluded = vec!["vendor".to_string()];

        assert!(is_excluded_path(&PathBuf::from("lib/vendor/a.js"), &excluded));
        assert!(!is_excluded_path(&PathBuf::from("lib/vendors.js"), &excluded));
    }
}
