//! Browser API namespace usage and deprecated calls

use super::ExtensionScanner;
use crate::models::{Finding, FindingCategory};
use crate::CoreConfig;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const API_PREFIXES: [&str; 11] = [
    "chrome.tabs",
    "chrome.cookies",
    "chrome.storage",
    "chrome.webRequest",
    "chrome.scripting",
    "chrome.runtime",
    "chrome.declarativeNetRequest",
    "browser.tabs",
    "browser.cookies",
    "browser.storage",
    "browser.runtime",
];

pub const DEPRECATED_APIS: [(&str, &str); 5] = [
    ("chrome.extension.getURL", "Use chrome.runtime.getURL instead"),
    ("chrome.extension.sendRequest", "Use chrome.runtime.sendMessage instead"),
    ("chrome.tabs.executeScript", "Use chrome.scripting.executeScript (MV3)"),
    ("chrome.tabs.insertCSS", "Use chrome.scripting.insertCSS (MV3)"),
    ("chrome.tabs.removeCSS", "Use chrome.scripting.removeCSS (MV3)"),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiUsageReport {
    pub used: Vec<String>,
    pub findings: Vec<Finding>,
}

pub struct ApiUsageScanner {
    root: PathBuf,
    config: CoreConfig,
}

impl ApiUsageScanner {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }
}

impl ExtensionScanner for ApiUsageScanner {
    type Report = ApiUsageReport;

    fn scanner_name(&self) -> &'static str {
        "api_usage"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> ApiUsageReport {
        let mut used = BTreeSet::new();
        let mut deprecated = BTreeSet::new();

        for path in self.source_files(&["js"]) {
            let Some(content) = self.read_source(&path) else {
                continue;
            };
            used.extend(
                API_PREFIXES
                    .iter()
                    .filter(|prefix| content.contains(*prefix))
                    .map(|prefix| (*prefix).to_string()),
            );
            deprecated.extend(
                DEPRECATED_APIS
                    .iter()
                    .filter(|(api, _)| content.contains(api))
                    .map(|(api, suggestion)| format!("Uses deprecated API: {api} ({suggestion})")),
            );
        }

        ApiUsageReport {
            used: used.into_iter().collect(),
            findings: deprecated
                .into_iter()
                .map(|message| Finding::warning(FindingCategory::Api, "api-deprecated", message))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_used_namespaces_and_deprecated_calls() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("bg.js"),
            "chrome.tabs.executeScript(1, {});\nchrome.storage.local.get('k');",
        )
        .unwrap();
        fs::write(dir.path().join("popup.js"), "chrome.extension.getURL('x');").unwrap();

        let report = ApiUsageScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.used, vec!["chrome.storage", "chrome.tabs"]);
        assert_eq!(
            report.findings.iter().map(|f| f.message.as_str()).collect::<Vec<_>>(),
            vec![
                "Uses deprecated API: chrome.extension.getURL (Use chrome.runtime.getURL instead)",
                "Uses deprecated API: chrome.tabs.executeScript (Use chrome.scripting.executeScript (MV3))",
            ]
        );
    }
}
