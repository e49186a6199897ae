//! Shared constants
//!
//! Thresholds and fixed pattern lists used by more than one checker.

use serde::{Deserialize, Serialize};

/// Name of the manifest document at the extension root
pub const MANIFEST_FILE: &str = "manifest.json";

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Host patterns that grant access to every site
pub const BROAD_HOST_PATTERNS: [&str; 4] = ["<all_urls>", "*://*/*", "http://*/*", "https://*/*"];

/// The subset of [`BROAD_HOST_PATTERNS`] that store policy treats as blocking
pub const BLOCKING_HOST_PATTERNS: [&str; 2] = ["<all_urls>", "*://*/*"];

/// Extensions of files scanned as script source
pub const SCRIPT_EXTENSIONS: [&str; 3] = ["js", "mjs", "ts"];

/// Extensions of files scanned as markup
pub const MARKUP_EXTENSIONS: [&str; 2] = ["html", "htm"];

/// Size thresholds for the size scanner and performance heuristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeThresholds;

impl SizeThresholds {
    /// Default total size warning threshold
    pub const WARN_MB: f64 = 25.0;
    /// Default total size failure threshold
    pub const FAIL_MB: f64 = 50.0;
}

pub fn is_broad_host_pattern(pattern: &str) -> bool {
    BROAD_HOST_PATTERNS.contains(&pattern)
}

pub fn is_blocking_host_pattern(pattern: &str) -> bool {
    BLOCKING_HOST_PATTERNS.contains(&pattern)
}

/// Convert bytes to megabytes
#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_pattern_sets() {
        assert!(is_broad_host_pattern("https://*/*"));
        assert!(!is_blocking_host_pattern("https://*/*"));
        assert!(is_blocking_host_pattern("<all_urls>"));
        assert!(!is_broad_host_pattern("https://example.com/*"));
    }

    #[test]
    fn test_bytes_to_mb() {
        assert!((bytes_to_mb(3 * BYTES_PER_MB) - 3.0).abs() < f64::EPSILON);
    }
}
