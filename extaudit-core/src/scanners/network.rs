//! Literal URL extraction from script sources

use super::ExtensionScanner;
use crate::models::{Finding, FindingCategory};
use crate::CoreConfig;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const TRACKING_DOMAINS: [&str; 6] = [
    "google-analytics.com",
    "googletagmanager.com",
    "doubleclick.net",
    "mixpanel.com",
    "segment.com",
    "amplitude.com",
];

lazy_static::lazy_static! {
    static ref SOURCE_URL: Regex = Regex::new(r#"https?://[^\s'"]+"#).expect("url pattern");
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkReport {
    /// Every distinct URL, sorted
    pub urls: Vec<String>,
    pub findings: Vec<Finding>,
}

impl NetworkReport {
    pub fn tracking_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.code == "network-tracking-domain")
            .count()
    }

    pub fn plaintext_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.code == "network-plaintext-http")
            .count()
    }
}

pub struct NetworkScanner {
    root: PathBuf,
    config: CoreConfig,
}

impl NetworkScanner {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }
}

impl ExtensionScanner for NetworkScanner {
    type Report = NetworkReport;

    fn scanner_name(&self) -> &'static str {
        "network"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> NetworkReport {
        let mut urls = BTreeSet::new();
        for path in self.source_files(&["js"]) {
            if let Some(content) = self.read_source(&path) {
                urls.extend(SOURCE_URL.find_iter(&content).map(|m| m.as_str().to_string()));
            }
        }

        // (code, message) pairs; BTreeSet keeps them unique and ordered
        let mut flagged = BTreeSet::new();
        for url in &urls {
            if url.starts_with("http://") {
                flagged.insert((
                    "network-plaintext-http",
                    format!("Unencrypted HTTP request: {url}"),
                ));
            }
            for domain in TRACKING_DOMAINS.iter().filter(|d| url.contains(*d)) {
                flagged.insert((
                    "network-tracking-domain",
                    format!("Tracking domain detected: {domain} ({url})"),
                ));
            }
        }

        NetworkReport {
            urls: urls.into_iter().collect(),
            findings: flagged
                .into_iter()
                .map(|(code, message)| Finding::warning(FindingCategory::Network, code, message))
                .collect(),
        }
    }
}
