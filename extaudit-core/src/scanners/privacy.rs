//! Data-collection indicators and privacy policy discovery

use super::ExtensionScanner;
use crate::models::{Finding, FindingCategory};
use crate::CoreConfig;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const ANALYTICS_DOMAINS: [&str; 7] = [
    "google-analytics.com",
    "googletagmanager.com",
    "mixpanel.com",
    "segment.com",
    "amplitude.com",
    "sentry.io",
    "datadog",
];

pub const POLICY_FILENAMES: [&str; 12] = [
    "privacy_policy.md",
    "privacy_policy.txt",
    "privacy_policy.html",
    "privacy-policy.md",
    "privacy-policy.txt",
    "privacy-policy.html",
    "PRIVACY_POLICY.md",
    "PRIVACY_POLICY.txt",
    "PRIVACY_POLICY.html",
    "PRIVACY-POLICY.md",
    "PRIVACY-POLICY.txt",
    "PRIVACY-POLICY.html",
];

lazy_static::lazy_static! {
    static ref INDICATORS: Vec<(&'static str, Regex)> = vec![
        ("network_fetch", Regex::new(r"\bfetch\s*\(").expect("fetch pattern")),
        ("xhr", Regex::new(r"\bXMLHttpRequest\b").expect("xhr pattern")),
        ("send_beacon", Regex::new(r"\bnavigator\.sendBeacon\b").expect("beacon pattern")),
        ("websocket", Regex::new(r"\bWebSocket\b").expect("websocket pattern")),
        ("cookies_api", Regex::new(r"\bchrome\.cookies\b|\bdocument\.cookie\b").expect("cookie pattern")),
        ("storage", Regex::new(r"\bchrome\.storage\b|\blocalStorage\b|\bsessionStorage\b").expect("storage pattern")),
    ];
    static ref TEXT_URL: Regex = Regex::new(r"https?://[^\s)\]]+").expect("url pattern");
}

/// Checks whether a URL answers
pub trait UrlChecker: Send + Sync {
    fn is_reachable(&self, url: &str) -> bool;
}

/// HEAD, falling back to GET; any 2xx/3xx counts as reachable
#[derive(Debug, Clone)]
pub struct HttpChecker {
    timeout: Duration,
}

impl HttpChecker {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlChecker for HttpChecker {
    fn is_reachable(&self, url: &str) -> bool {
        // Built per call: the blocking client owns a runtime and must not be
        // created or dropped on an async worker thread
        let client = match reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("privacy: cannot build HTTP client: {}", e);
                return false;
            }
        };

        let ok = |status: reqwest::StatusCode| status.is_success() || status.is_redirection();

        if let Ok(response) = client.head(url).send() {
            if ok(response.status()) {
                return true;
            }
        }

        match client.get(url).send() {
            Ok(response) => ok(response.status()),
            Err(e) => {
                tracing::debug!("privacy: {} unreachable: {}", url, e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrivacyReport {
    /// `"kind: file"` entries, sorted and unique
    pub data_indicators: Vec<String>,
    pub policy_file: Option<String>,
    pub policy_url: Option<String>,
    /// `None` when no URL was found or probing is disabled
    pub policy_url_reachable: Option<bool>,
    pub findings: Vec<Finding>,
}

impl PrivacyReport {
    pub fn has_policy(&self) -> bool {
        self.policy_file.is_some() || self.policy_url.is_some()
    }

    /// Indicators of a given kind (`analytics`, `cookies_api`, ...)
    pub fn indicators_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.data_indicators
            .iter()
            .filter(move |entry| entry.split(':').next() == Some(kind))
    }
}

pub struct PrivacyScanner {
    root: PathBuf,
    config: CoreConfig,
    checker: Option<Arc<dyn UrlChecker>>,
}

impl PrivacyScanner {
    /// Scanner that checks discovered URLs over HTTP
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
            checker: Some(Arc::new(HttpChecker::new())),
        }
    }

    #[must_use]
    pub fn without_reachability(mut self) -> Self {
        self.checker = None;
        self
    }

    #[must_use]
    pub fn with_reachability(mut self, checker: Arc<dyn UrlChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    fn data_indicators(&self) -> Vec<String> {
        let mut indicators = BTreeSet::new();

        for path in self.source_files(&["js"]) {
            let Some(content) = self.read_source(&path) else {
                continue;
            };
            let file = self.relative(&path);

            for (kind, regex) in INDICATORS.iter() {
                if regex.is_match(&content) {
                    indicators.insert(format!("{kind}: {file}"));
                }
            }
            for domain in ANALYTICS_DOMAINS {
                if content.contains(domain) {
                    indicators.insert(format!("analytics: {domain} in {file}"));
                }
            }
        }

        indicators.into_iter().collect()
    }

    fn policy_file(&self) -> Option<String> {
        POLICY_FILENAMES
            .iter()
            .find(|name| self.root.join(name).is_file())
            .map(|name| (*name).to_string())
    }

    fn policy_url(&self, policy_file: Option<&str>) -> Option<String> {
        let mut urls = Vec::new();

        let readme = self.root.join("README.md");
        if readme.is_file() {
            if let Some(text) = self.read_source(&readme) {
                urls.extend(extract_urls(&text));
            }
        }

        if let Some(manifest) = self.load_manifest() {
            for value in [
                &manifest.homepage_url,
                &manifest.privacy_policy_url,
                &manifest.developer,
                &manifest.author,
            ]
            .into_iter()
            .flatten()
            {
                urls.extend(extract_urls(value));
            }
        }

        if let Some(file) = policy_file {
            if let Some(text) = self.read_source(&self.root.join(file)) {
                urls.extend(extract_urls(&text));
            }
        }

        urls.iter()
            .find(|url| url.to_lowercase().contains("privacy"))
            .or_else(|| urls.first())
            .cloned()
    }
}

impl ExtensionScanner for PrivacyScanner {
    type Report = PrivacyReport;

    fn scanner_name(&self) -> &'static str {
        "privacy"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> PrivacyReport {
        let data_indicators = self.data_indicators();
        let policy_file = self.policy_file();
        let policy_url = self.policy_url(policy_file.as_deref());

        let policy_url_reachable = match (&policy_url, &self.checker) {
            (Some(url), Some(checker)) => Some(checker.is_reachable(url)),
            _ => None,
        };

        let mut findings = Vec::new();
        if !data_indicators.is_empty() && policy_file.is_none() && policy_url.is_none() {
            findings.push(Finding::warning(
                FindingCategory::Privacy,
                "privacy-missing-policy",
                "Data collection indicators found but no privacy policy detected",
            ));
        }
        if policy_url_reachable == Some(false) {
            findings.push(Finding::warning(
                FindingCategory::Privacy,
                "privacy-policy-unreachable",
                "Privacy policy URL appears unreachable",
            ));
        }

        PrivacyReport {
            data_indicators,
            policy_file,
            policy_url,
            policy_url_reachable,
            findings,
        }
    }
}

fn extract_urls(text: &str) -> Vec<String> {
    TEXT_URL
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct FixedChecker(bool);

    impl UrlChecker for FixedChecker {
        fn is_reachable(&self, _url: &str) -> bool {
            self.0
        }
    }

    #[test]
    fn test_indicators_without_policy() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("bg.js"),
            "fetch('https://www.google-analytics.com/collect'); localStorage.setItem('a', 1);",
        )
        .unwrap();

        let report = PrivacyScanner::new(dir.path(), CoreConfig::default())
            .without_reachability()
            .scan();

        assert_eq!(
            report.data_indicators,
            vec![
                "analytics: google-analytics.com in bg.js",
                "network_fetch: bg.js",
                "storage: bg.js",
            ]
        );
        assert_eq!(report.indicators_of("analytics").count(), 1);
        assert!(!report.has_policy());
        assert_eq!(report.findings[0].code, "privacy-missing-policy");
        assert_eq!(report.policy_url_reachable, None);
    }

    #[test]
    fn test_policy_url_prefers_privacy_links() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("README.md"),
            "Home: https://example.com/home\nPolicy: https://example.com/privacy)",
        )
        .unwrap();
        fs::write(dir.path().join("a.js"), "document.cookie").unwrap();

        let report = PrivacyScanner::new(dir.path(), CoreConfig::default())
            .with_reachability(Arc::new(FixedChecker(false)))
            .scan();

        assert_eq!(report.policy_url.as_deref(), Some("https://example.com/privacy"));
        assert_eq!(report.policy_url_reachable, Some(false));
        assert_eq!(
            report.findings.iter().map(|f| f.code.as_str()).collect::<Vec<_>>(),
            vec!["privacy-policy-unreachable"]
        );
    }

    #[test]
    fn test_policy_file_and_manifest_url() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("PRIVACY-POLICY.md"), "We collect nothing.").unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":3,"name":"P","version":"1","homepage_url":"https://ext.example.org"}"#,
        )
        .unwrap();

        let report = PrivacyScanner::new(dir.path(), CoreConfig::default())
            .with_reachability(Arc::new(FixedChecker(true)))
            .scan();

        assert_eq!(report.policy_file.as_deref(), Some("PRIVACY-POLICY.md"));
        assert_eq!(report.policy_url.as_deref(), Some("https://ext.example.org"));
        assert_eq!(report.policy_url_reachable, Some(true));
        assert!(report.findings.is_empty());
    }
}
