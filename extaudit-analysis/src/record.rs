//! Per-extension inputs for scoring

use crate::pipeline::PipelineConfig;
use extaudit_core::scanners::{
    ExtensionScanner, NetworkReport, NetworkScanner, PrivacyReport, PrivacyScanner, SecurityReport,
    SecurityScanner, SizeScanner,
};
use extaudit_core::{BrowserKind, ManifestStore, RuleEngine, ValidationResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Identity fields from the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionMeta {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_size_mb: f64,
    pub file_count: usize,
    pub largest_file_mb: f64,
}

/// Everything the scoring engine looks at. A `None` section scores as
/// optimal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtensionRecord {
    pub extension: String,
    pub meta: Option<ExtensionMeta>,
    pub performance: Option<PerformanceMetrics>,
    pub security: Option<SecurityReport>,
    pub privacy: Option<PrivacyReport>,
    pub network: Option<NetworkReport>,
    pub browsers: BTreeMap<BrowserKind, ValidationResult>,
}

impl ExtensionRecord {
    /// Run the scanners that feed scoring and validate for each browser
    pub fn collect(root: &Path, browsers: &[BrowserKind], config: &PipelineConfig) -> Self {
        let core = &config.core;

        // A missing manifest leaves every identity field absent
        let meta = ManifestStore::new(root)
            .load_lenient()
            .map(|manifest| ExtensionMeta {
                name: manifest.name,
                version: manifest.version,
                description: manifest.description,
            })
            .unwrap_or_default();

        let size = SizeScanner::new(root, core.clone()).scan();
        let mut privacy = PrivacyScanner::new(root, core.clone());
        if !config.check_policy_urls {
            privacy = privacy.without_reachability();
        }

        let engine = RuleEngine::new(core.clone());
        let browsers = browsers
            .iter()
            .map(|browser| (*browser, engine.validate(root, *browser)))
            .collect();

        Self {
            extension: root
                .file_name()
                .map_or_else(String::new, |name| name.to_string_lossy().into_owned()),
            meta: Some(meta),
            performance: Some(PerformanceMetrics {
                total_size_mb: size.total_mb,
                file_count: size.file_count,
                largest_file_mb: size.largest_file_mb(),
            }),
            security: Some(SecurityScanner::new(root, core.clone()).scan()),
            privacy: Some(privacy.scan()),
            network: Some(NetworkScanner::new(root, core.clone()).scan()),
            browsers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn offline() -> PipelineConfig {
        PipelineConfig {
            check_policy_urls: false,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_collect_fills_every_section() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":3,"name":"T","version":"1.0","description":"d"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("bg.js"), "eval(x); fetch('http://example.com/a');").unwrap();

        let record = ExtensionRecord::collect(
            dir.path(),
            &[BrowserKind::Chrome, BrowserKind::Firefox],
            &offline(),
        );
        assert_eq!(
            record.meta,
            Some(ExtensionMeta {
                name: Some("T".to_string()),
                version: Some("1.0".to_string()),
                description: Some("d".to_string()),
            })
        );
        assert_eq!(record.performance.as_ref().unwrap().file_count, 2);
        assert!(record.security.as_ref().unwrap().findings.len() >= 2);
        assert_eq!(record.network.as_ref().unwrap().plaintext_count(), 1);
        assert_eq!(record.browsers.len(), 2);
        assert!(record.browsers[&BrowserKind::Chrome].is_valid);
    }

    #[test]
    fn test_missing_manifest_leaves_meta_empty() {
        let dir = tempdir().unwrap();
        let record = ExtensionRecord::collect(dir.path(), &[BrowserKind::Edge], &offline());
        assert_eq!(record.meta, Some(ExtensionMeta::default()));
        assert!(!record.browsers[&BrowserKind::Edge].is_valid);
    }
}
