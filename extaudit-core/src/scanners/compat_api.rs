//! Cross-browser API compatibility tables
//!
//! Everything reported here is advisory: findings are always warnings.

use super::ExtensionScanner;
use crate::models::{BrowserKind, Finding, FindingCategory, ManifestDocument};
use crate::CoreConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// APIs only Chromium browsers provide
pub const CHROME_ONLY_APIS: [(&str, &str); 9] = [
    ("chrome.scripting", "Scripting API - not in Firefox. Use content scripts instead."),
    ("chrome.declarativeNetRequest", "DNR API - not in Firefox. Use webRequest or use tabs API."),
    ("chrome.sidePanel", "Side panel - not in Firefox. No equivalent."),
    ("chrome.readingList", "Reading List API - Chrome only."),
    ("chrome.tabGroups", "Tab Groups - Chrome only."),
    ("chrome.sessions", "Sessions API - Chrome only."),
    ("chrome.management.getPermissionWarningsById", "Chrome only."),
    ("chrome.autofill", "Autofill API - Chrome only."),
    ("chrome.offscreen", "Offscreen documents - not supported in Firefox."),
];

/// APIs only Firefox provides
pub const FIREFOX_ONLY_APIS: [(&str, &str); 2] = [
    ("browser.windows", "Windows API - limited in Chrome. Use chrome.windows instead."),
    ("browser.menus", "Menus API - Chrome uses contextMenus instead."),
];

pub const REPLACEMENTS: [(&str, &str); 5] = [
    ("chrome.scripting.executeScript", "Use content scripts with event listeners"),
    ("chrome.declarativeNetRequest", "Use webRequest or service worker message handling"),
    ("chrome.alarms", "Use setTimeout / setInterval in service worker"),
    ("chrome.management", "Not available - remove or make optional"),
    ("chrome.system", "Not available in all browsers - check availability"),
];

/// Suggested replacement for an API, if one is known
pub fn suggestion_for(api: &str) -> Option<&'static str> {
    REPLACEMENTS
        .iter()
        .find(|(name, _)| *name == api)
        .map(|(_, suggestion)| *suggestion)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompatibilityReport {
    pub per_browser: BTreeMap<BrowserKind, Vec<Finding>>,
}

impl CompatibilityReport {
    pub fn total_warnings(&self) -> usize {
        self.per_browser.values().map(Vec::len).sum()
    }
}

pub struct ApiCompatibilityChecker {
    root: PathBuf,
    config: CoreConfig,
    browsers: Vec<BrowserKind>,
}

impl ApiCompatibilityChecker {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig, browsers: &[BrowserKind]) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
            browsers: browsers.to_vec(),
        }
    }

    /// Source-level findings for one browser
    fn source_findings(
        &self,
        browser: BrowserKind,
        sources: &[(String, String)],
        manifest: Option<&ManifestDocument>,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        let is_mv3 = manifest.map_or(false, ManifestDocument::is_mv3);

        for (file, code) in sources {
            let foreign: &[(&str, &str)] = if browser.is_chromium() {
                &FIREFOX_ONLY_APIS
            } else {
                &CHROME_ONLY_APIS
            };
            for (api, issue) in foreign {
                if code.contains(api) {
                    let mut message = format!("{api} used in {file} is not available in {browser}: {issue}");
                    if let Some(suggestion) = suggestion_for(api) {
                        message.push_str(&format!(" Suggestion: {suggestion}"));
                    }
                    findings.push(Finding::warning(
                        FindingCategory::Compatibility,
                        "compat-api-unavailable",
                        message,
                    ));
                }
            }

            if is_mv3 && code.contains("chrome.webRequest") {
                findings.push(Finding::warning(
                    FindingCategory::Compatibility,
                    "compat-webrequest-mv3",
                    format!("chrome.webRequest used in MV3 extension ({file}) - use declarativeNetRequest instead"),
                ));
            }
        }

        findings
    }

    fn manifest_findings(browser: BrowserKind, manifest: &ManifestDocument) -> Vec<Finding> {
        let mut findings = Vec::new();
        let has = |perm: &str| manifest.permissions.iter().any(|p| p == perm);

        if manifest.is_mv3() {
            for perm in ["webRequest", "webRequestBlocking"] {
                if has(perm) {
                    findings.push(Finding::warning(
                        FindingCategory::Compatibility,
                        "compat-deprecated-permission",
                        format!("'{perm}' permission is deprecated in Manifest v3 - use declarativeNetRequest"),
                    ));
                }
            }
        }
        if has("pageCapture") && !browser.is_chromium() {
            findings.push(Finding::warning(
                FindingCategory::Compatibility,
                "compat-chrome-only-permission",
                format!("'pageCapture' permission is Chrome-specific and not supported in {browser}"),
            ));
        }

        findings
    }
}

impl ExtensionScanner for ApiCompatibilityChecker {
    type Report = CompatibilityReport;

    fn scanner_name(&self) -> &'static str {
        "compat_api"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> CompatibilityReport {
        let manifest = self.load_manifest();
        let sources: Vec<(String, String)> = self
            .source_files(&["js"])
            .into_iter()
            .filter_map(|path| {
                let content = self.read_source(&path)?;
                Some((self.relative(&path), strip_line_comments(&content)))
            })
            .collect();

        let per_browser = self
            .browsers
            .iter()
            .map(|browser| {
                let mut findings = self.source_findings(*browser, &sources, manifest.as_ref());
                if let Some(manifest) = &manifest {
                    findings.extend(Self::manifest_findings(*browser, manifest));
                }
                (*browser, findings)
            })
            .collect();

        CompatibilityReport { per_browser }
    }
}

/// Drop `//` line comments so commented-out calls are not reported.
/// `://` inside URLs is left alone.
fn strip_line_comments(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let mut search = 0;
            while let Some(offset) = line[search..].find("//") {
                let at = search + offset;
                if at > 0 && line.as_bytes()[at - 1] == b':' {
                    search = at + 2;
                    continue;
                }
                return &line[..at];
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fixture(manifest: &str, script: &str) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("manifest.json"), manifest).unwrap();
        fs::write(dir.path().join("bg.js"), script).unwrap();
        dir
    }

    #[test]
    fn test_chrome_only_api_flagged_for_firefox_only() {
        let dir = fixture(
            r#"{"manifest_version":3,"name":"A","version":"1"}"#,
            "chrome.sidePanel.open({});\nchrome.declarativeNetRequest.updateDynamicRules({});",
        );
        let report = ApiCompatibilityChecker::new(
            dir.path(),
            CoreConfig::default(),
            &[BrowserKind::Chrome, BrowserKind::Firefox],
        )
        .scan();

        assert!(report.per_browser[&BrowserKind::Chrome].is_empty());
        let firefox = &report.per_browser[&BrowserKind::Firefox];
        assert_eq!(firefox.len(), 2);
        assert!(firefox.iter().all(Finding::is_warning));
        assert!(firefox[0].message.contains("Suggestion: Use webRequest"));
        assert!(firefox[1].message.starts_with("chrome.sidePanel used in bg.js"));
    }

    #[test]
    fn test_commented_calls_ignored() {
        let dir = fixture(
            r#"{"manifest_version":2,"name":"A","version":"1"}"#,
            "// chrome.tabGroups.query({})\nfetch('https://example.com'); // browser.menus\n",
        );
        let report = ApiCompatibilityChecker::new(
            dir.path(),
            CoreConfig::default(),
            &[BrowserKind::Firefox, BrowserKind::Edge],
        )
        .scan();
        assert_eq!(report.total_warnings(), 0);
    }

    #[test]
    fn test_mv3_webrequest_and_permissions() {
        let dir = fixture(
            r#"{"manifest_version":3,"name":"A","version":"1",
                "permissions":["webRequest","webRequestBlocking","pageCapture"]}"#,
            "chrome.webRequest.onBeforeRequest.addListener(() => {});",
        );
        let report = ApiCompatibilityChecker::new(
            dir.path(),
            CoreConfig::default(),
            &[BrowserKind::Chrome, BrowserKind::Safari],
        )
        .scan();

        let chrome: Vec<&str> = report.per_browser[&BrowserKind::Chrome]
            .iter()
            .map(|f| f.code.as_str())
            .collect();
        assert_eq!(
            chrome,
            vec![
                "compat-webrequest-mv3",
                "compat-deprecated-permission",
                "compat-deprecated-permission"
            ]
        );
        assert!(report.per_browser[&BrowserKind::Safari]
            .iter()
            .any(|f| f.code == "compat-chrome-only-permission"));
    }

    #[test]
    fn test_strip_line_comments_keeps_urls() {
        assert_eq!(
            strip_line_comments("a('https://x.y/z'); // note\n// gone"),
            "a('https://x.y/z'); \n"
        );
        assert_eq!(suggestion_for("chrome.alarms"), Some("Use setTimeout / setInterval in service worker"));
    }
}
