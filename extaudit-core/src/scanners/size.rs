//! Extension size accounting

use super::{collect_all_files, ExtensionScanner};
use crate::constants::bytes_to_mb;
use crate::models::{Finding, FindingCategory};
use crate::CoreConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSize {
    pub file: String,
    pub bytes: u64,
    pub mb: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SizeReport {
    pub total_bytes: u64,
    pub total_mb: f64,
    pub file_count: usize,
    /// Lowercase extension with dot (`.js`), or `<no_ext>` -> MB
    pub by_type: BTreeMap<String, f64>,
    /// Largest first
    pub largest_files: Vec<FileSize>,
    pub findings: Vec<Finding>,
}

impl SizeReport {
    pub fn largest_file_mb(&self) -> f64 {
        self.largest_files.first().map_or(0.0, |f| f.mb)
    }
}

pub struct SizeScanner {
    root: PathBuf,
    config: CoreConfig,
}

impl SizeScanner {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }
}

impl ExtensionScanner for SizeScanner {
    type Report = SizeReport;

    fn scanner_name(&self) -> &'static str {
        "size"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> SizeReport {
        let mut report = SizeReport::default();
        let mut by_type_bytes: BTreeMap<String, u64> = BTreeMap::new();
        let mut files: Vec<(String, u64)> = Vec::new();

        // Oversized files count here even though text scanners skip them
        for path in collect_all_files(&self.root) {
            let bytes = match std::fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::debug!("size: cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            report.total_bytes += bytes;
            report.file_count += 1;

            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or_else(|| "<no_ext>".to_string(), |e| format!(".{}", e.to_lowercase()));
            *by_type_bytes.entry(ext).or_insert(0) += bytes;
            files.push((self.relative(&path), bytes));
        }

        // Stable: ties keep walk order
        files.sort_by(|a, b| b.1.cmp(&a.1));
        report.largest_files = files
            .into_iter()
            .take(self.config.largest_files_reported)
            .map(|(file, bytes)| FileSize {
                file,
                bytes,
                mb: round2(bytes_to_mb(bytes)),
            })
            .collect();

        report.by_type = by_type_bytes
            .into_iter()
            .map(|(ext, bytes)| (ext, round2(bytes_to_mb(bytes))))
            .collect();

        let total_mb = bytes_to_mb(report.total_bytes);
        report.total_mb = round2(total_mb);

        if total_mb >= self.config.size_fail_mb {
            report.findings.push(Finding::error(
                FindingCategory::Size,
                "size-exceeds-fail",
                format!(
                    "Extension size is {total_mb:.2} MB (exceeds {} MB threshold)",
                    self.config.size_fail_mb
                ),
            ));
        } else if total_mb >= self.config.size_warn_mb {
            report.findings.push(Finding::warning(
                FindingCategory::Size,
                "size-exceeds-warn",
                format!(
                    "Extension size is {total_mb:.2} MB (exceeds {} MB threshold)",
                    self.config.size_warn_mb
                ),
            ));
        }

        report
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BYTES_PER_MB;
    use std::fs;
    use tempfile::tempdir;

    fn sparse(path: &Path, bytes: u64) {
        let file = fs::File::create(path).unwrap();
        file.set_len(bytes).unwrap();
    }

    #[test]
    fn test_over_fail_threshold_is_error() {
        let dir = tempdir().unwrap();
        sparse(&dir.path().join("video.mp4"), 60 * BYTES_PER_MB);
        fs::write(dir.path().join("manifest.json"), "{}").unwrap();

        let report = SizeScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.file_count, 2);
        assert_eq!(report.findings.len(), 1);
        assert!(report.findings[0].is_error());
        assert!(report.findings[0].message.contains("exceeds 50 MB threshold"));
        assert_eq!(report.largest_files[0].file, "video.mp4");
        assert!((report.largest_file_mb() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bundled_dependencies_count_toward_size() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        sparse(&dir.path().join("node_modules/lib/bundle.bin"), 60 * BYTES_PER_MB);

        let report = SizeScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.file_count, 1);
        assert!((report.total_mb - 60.0).abs() < f64::EPSILON);
        assert!(report.findings.iter().any(Finding::is_error));
        assert_eq!(report.largest_files[0].file, "node_modules/lib/bundle.bin");
    }

    #[test]
    fn test_warn_threshold_and_by_type() {
        let dir = tempdir().unwrap();
        sparse(&dir.path().join("a.PNG"), 20 * BYTES_PER_MB);
        sparse(&dir.path().join("b.png"), 10 * BYTES_PER_MB);
        fs::write(dir.path().join("LICENSE"), "mit").unwrap();

        let report = SizeScanner::new(dir.path(), CoreConfig::default()).scan();
        assert!(report.findings[0].is_warning());
        assert!((report.by_type[".png"] - 30.0).abs() < f64::EPSILON);
        assert!(report.by_type.contains_key("<no_ext>"));
    }

    #[test]
    fn test_largest_files_limit() {
        let dir = tempdir().unwrap();
        for i in 0..15u64 {
            sparse(&dir.path().join(format!("f{i:02}.bin")), i * 1024);
        }
        let report = SizeScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.largest_files.len(), 10);
        assert_eq!(report.largest_files[0].file, "f14.bin");
        assert!(report.findings.is_empty());
    }
}
