//! Static scanners
//!
//! Every scanner is read-only and independent of the others. A scanner never
//! fails on I/O: unreadable files are logged and skipped, so a report always
//! comes back, possibly partial.

pub mod api_usage;
pub mod compat_api;
pub mod dependency;
pub mod lint;
pub mod network;
pub mod privacy;
pub mod security;
pub mod size;
pub mod store;

pub use api_usage::{ApiUsageReport, ApiUsageScanner};
pub use compat_api::{ApiCompatibilityChecker, CompatibilityReport};
pub use dependency::{DependencyReport, DependencyScanner, DetectedLibrary};
pub use lint::{DependencyGraph, LintEngine, LintReport, LintSummary};
pub use network::{NetworkReport, NetworkScanner};
pub use privacy::{HttpChecker, PrivacyReport, PrivacyScanner, UrlChecker};
pub use security::{SecurityPattern, SecurityReport, SecurityScanner};
pub use size::{FileSize, SizeReport, SizeScanner};
pub use store::{StoreComplianceScanner, StoreReport, StoreResult};

use crate::manifest::ManifestStore;
use crate::models::ManifestDocument;
use crate::CoreConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Common behaviour of all static scanners
pub trait ExtensionScanner {
    /// Serializable scan output
    type Report: Serialize;

    /// Short identifier used in logs and stage details
    fn scanner_name(&self) -> &'static str;

    fn extension_root(&self) -> &Path;

    fn config(&self) -> &CoreConfig;

    /// Run the scan. Never fails; I/O problems shrink the report instead.
    fn scan(&self) -> Self::Report;

    /// Files under the root whose extension is one of `extensions`
    /// (case-insensitive, without the dot). An empty slice means every file.
    fn source_files(&self, extensions: &[&str]) -> Vec<PathBuf> {
        collect_files(self.extension_root(), &self.config().excluded_dirs)
            .into_iter()
            .filter(|path| extensions.is_empty() || has_extension(path, extensions))
            .collect()
    }

    /// Read a source file as lossy UTF-8, skipping files over the size limit
    fn read_source(&self, path: &Path) -> Option<String> {
        let limit = self.config().max_file_bytes;
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > limit => {
                tracing::debug!(
                    "{}: skipping {} ({} bytes exceeds limit)",
                    self.scanner_name(),
                    path.display(),
                    meta.len()
                );
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("{}: cannot stat {}: {}", self.scanner_name(), path.display(), e);
                return None;
            }
        }

        match extaudit_utils::file::read_text_lossy(path) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!("{}: cannot read {}: {}", self.scanner_name(), path.display(), e);
                None
            }
        }
    }

    /// Path relative to the extension root, forward slashes
    fn relative(&self, path: &Path) -> String {
        extaudit_utils::relative_display(self.extension_root(), path)
    }

    /// The parsed manifest, or `None` when missing or invalid
    fn load_manifest(&self) -> Option<ManifestDocument> {
        ManifestStore::new(self.extension_root()).load_lenient()
    }
}

/// Every regular file under `root`, skipping excluded directories, in a
/// stable (file-name sorted) order. Walk errors are logged and skipped.
pub fn collect_files(root: &Path, excluded: &[String]) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !extaudit_utils::is_excluded_path(Path::new(entry.file_name()), excluded)
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("walk error under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Every regular file under `root`, bundled dependency and VCS directories
/// included. Size accounting uses this; text scanners use [`collect_files`].
pub fn collect_all_files(root: &Path) -> Vec<PathBuf> {
    collect_files(root, &[])
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        root: PathBuf,
        config: CoreConfig,
    }

    impl ExtensionScanner for Fixture {
        type Report = usize;

        fn scanner_name(&self) -> &'static str {
            "fixture"
        }

        fn extension_root(&self) -> &Path {
            &self.root
        }

        fn config(&self) -> &CoreConfig {
            &self.config
        }

        fn scan(&self) -> usize {
            self.source_files(&["js"]).len()
        }
    }

    #[test]
    fn test_collect_files_skips_excluded_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("node_modules/lib/x.js"), "").unwrap();
        fs::write(dir.path().join("js/b.js"), "").unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();

        let files = collect_files(dir.path(), &extaudit_utils::default_excluded_dirs());
        let names: Vec<String> = files
            .iter()
            .map(|p| extaudit_utils::relative_display(dir.path(), p))
            .collect();
        assert_eq!(names, vec!["a.js", "js/b.js"]);

        let everything = collect_all_files(dir.path());
        assert_eq!(everything.len(), 3);
        assert!(everything.iter().any(|p| p.ends_with("node_modules/lib/x.js")));
    }

    #[test]
    fn test_source_files_filter_and_size_limit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.JS"), "eval(x)").unwrap();
        fs::write(dir.path().join("page.html"), "<p>").unwrap();
        fs::write(dir.path().join("big.js"), "x".repeat(64)).unwrap();

        let fixture = Fixture {
            root: dir.path().to_path_buf(),
            config: CoreConfig {
                max_file_bytes: 32,
                ..CoreConfig::default()
            },
        };

        assert_eq!(fixture.scan(), 2);
        assert!(fixture.read_source(&dir.path().join("big.js")).is_none());
        assert_eq!(fixture.read_source(&dir.path().join("app.JS")).as_deref(), Some("eval(x)"));
        assert!(fixture.read_source(&dir.path().join("missing.js")).is_none());
        assert!(fixture.load_manifest().is_none());
    }
}
