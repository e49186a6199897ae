//! Rule-based manifest validation
//!
//! [`RuleEngine::validate`] runs its checks in a fixed order so identical
//! input always yields identically ordered output:
//!
//! 1. structure
//! 2. referenced-file existence
//! 3. permissions
//! 4. target-browser rules
//! 5. manifest-version rules
//! 6. performance heuristics
//! 7. security / CSP

pub mod compat;
pub mod permissions;

pub use compat::detect_compatibility;
pub use permissions::{max_permission_risk, permission_risk};

use crate::constants::{bytes_to_mb, is_blocking_host_pattern, is_broad_host_pattern};
use crate::manifest::ManifestStore;
use crate::models::{
    BrowserKind, Finding, FindingCategory, ManifestDocument, RiskTier, ValidationResult,
};
use crate::scanners::collect_all_files;
use crate::CoreConfig;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Validates an extension directory against platform rules
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: CoreConfig,
}

impl RuleEngine {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Validate the extension at `root` for `target`
    pub fn validate(&self, root: &Path, target: BrowserKind) -> ValidationResult {
        if !root.is_dir() {
            return ValidationResult::from_findings(
                vec![Finding::error(
                    FindingCategory::Structure,
                    "extension-not-directory",
                    format!("Extension path is not a directory: {}", root.display()),
                )],
                BTreeSet::new(),
            );
        }

        let manifest = match ManifestStore::new(root).load() {
            Ok(manifest) => manifest,
            Err(e) => {
                return ValidationResult::from_findings(
                    vec![Finding::error(FindingCategory::Structure, e.code(), e.to_string())],
                    BTreeSet::new(),
                );
            }
        };

        self.validate_manifest(root, &manifest, target)
    }

    /// Validate an already loaded manifest
    pub fn validate_manifest(
        &self,
        root: &Path,
        manifest: &ManifestDocument,
        target: BrowserKind,
    ) -> ValidationResult {
        let compatible_browsers = detect_compatibility(manifest);

        let mut checks = RuleChecks {
            root,
            manifest,
            config: &self.config,
            findings: Vec::new(),
        };

        checks.structure();
        checks.referenced_files();
        checks.permissions();
        checks.browser_specific(target);
        checks.version_specific();
        checks.performance();
        checks.security();

        ValidationResult::from_findings(checks.findings, compatible_browsers)
    }

    /// Validate every non-hidden immediate subdirectory of `dir` that holds a
    /// manifest, keyed by directory name
    pub fn validate_all(&self, dir: &Path, target: BrowserKind) -> BTreeMap<String, ValidationResult> {
        let mut results = BTreeMap::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Directory not found: {}: {}", dir.display(), e);
                return results;
            }
        };

        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if !path.is_dir() || name.starts_with('.') {
                continue;
            }
            if ManifestStore::new(&path).exists() {
                results.insert(name, self.validate(&path, target));
            }
        }

        if results.is_empty() {
            tracing::warn!("No extensions with manifest.json found in {}", dir.display());
        }

        results
    }
}

/// Per-run accumulator; one method per check phase
struct RuleChecks<'a> {
    root: &'a Path,
    manifest: &'a ManifestDocument,
    config: &'a CoreConfig,
    findings: Vec<Finding>,
}

impl<'a> RuleChecks<'a> {
    fn error(&mut self, category: FindingCategory, code: &str, message: String) {
        self.findings.push(Finding::error(category, code, message));
    }

    fn warning(&mut self, category: FindingCategory, code: &str, message: String) {
        self.findings.push(Finding::warning(category, code, message));
    }

    fn raw(&self, key: &str) -> Option<&'a Value> {
        self.manifest.raw_object().and_then(|obj| obj.get(key))
    }

    fn structure(&mut self) {
        use FindingCategory::Structure;

        match self.raw("manifest_version") {
            None => self.error(
                Structure,
                "manifest-missing-field",
                "Missing 'manifest_version' in manifest.json".to_string(),
            ),
            Some(value) if matches!(value.as_u64(), Some(2 | 3)) => {}
            Some(value) => self.error(
                Structure,
                "manifest-invalid-version",
                format!("Invalid manifest_version: {value} (must be 2 or 3)"),
            ),
        }

        for field in ["name", "version"] {
            match self.raw(field) {
                None => self.error(
                    Structure,
                    "manifest-missing-field",
                    format!("Missing required field '{field}' in manifest.json"),
                ),
                Some(value) if !value.is_string() => self.error(
                    Structure,
                    "manifest-wrong-type",
                    format!("Field '{field}' has wrong type. Expected string"),
                ),
                Some(_) => {}
            }
        }

        match self.raw("description") {
            None => self.warning(
                Structure,
                "manifest-missing-description",
                "Missing optional field 'description' in manifest.json".to_string(),
            ),
            Some(value) if !value.is_string() => self.error(
                Structure,
                "manifest-wrong-type",
                "Field 'description' has wrong type. Expected string".to_string(),
            ),
            Some(_) => {}
        }

        match self.raw("icons") {
            None => self.warning(
                Structure,
                "icons-missing",
                "No icons specified in manifest.json".to_string(),
            ),
            Some(Value::Object(icons)) if icons.is_empty() => {
                self.warning(Structure, "icons-empty", "'icons' object is empty".to_string());
            }
            Some(Value::Object(_)) => {}
            Some(_) => self.error(
                Structure,
                "manifest-wrong-type",
                "'icons' must be an object with size keys".to_string(),
            ),
        }

        if self.manifest.is_mv3() && !self.manifest.has_browser_specific_settings {
            self.warning(
                FindingCategory::Compatibility,
                "compat-firefox-limited-mv3",
                "Firefox has limited Manifest v3 support".to_string(),
            );
        }
    }

    fn referenced_files(&mut self) {
        let manifest = self.manifest;

        let mut icons: Vec<(&String, &String)> = manifest.icons.iter().collect();
        icons.sort_by_key(|(size, _)| (size.parse::<u32>().unwrap_or(u32::MAX), (*size).clone()));
        for (_, path) in icons {
            self.check_reference(path, "file-missing-icon", "Icon file");
        }

        for script in &manifest.content_scripts {
            for js in &script.js {
                self.check_reference(js, "file-missing-content-script", "Content script");
            }
            for css in &script.css {
                self.check_reference(css, "file-missing-stylesheet", "Content stylesheet");
            }
        }

        if let Some(background) = &manifest.background {
            if let Some(worker) = &background.service_worker {
                self.check_reference(worker, "file-missing-background", "Service worker");
            }
            for script in &background.scripts {
                self.check_reference(script, "file-missing-background", "Background script");
            }
            if let Some(page) = &background.page {
                self.check_reference(page, "file-missing-background", "Background page");
            }
        }
    }

    /// Missing references break loading, so they are always errors
    fn check_reference(&mut self, relative: &str, code: &str, label: &str) {
        match extaudit_utils::safe_path_join(self.root, Path::new(relative)) {
            Ok(path) if path.exists() => {}
            Ok(_) => self.error(
                FindingCategory::Files,
                code,
                format!("{label} not found: {relative}"),
            ),
            Err(_) => self.error(
                FindingCategory::Files,
                "file-path-escapes-root",
                format!("{label} path escapes the extension root: {relative}"),
            ),
        }
    }

    fn permissions(&mut self) {
        use FindingCategory::Permissions;

        match self.raw("permissions") {
            None => {}
            Some(Value::Array(entries)) => {
                for entry in entries.iter().filter(|e| !e.is_string()) {
                    self.error(
                        Permissions,
                        "permission-invalid-entry",
                        format!("Invalid permission: {entry} (must be string)"),
                    );
                }
            }
            Some(_) => self.error(
                Permissions,
                "permissions-not-array",
                "'permissions' must be an array".to_string(),
            ),
        }

        if let Some(value) = self.raw("host_permissions") {
            if !value.is_array() {
                self.error(
                    Permissions,
                    "permissions-not-array",
                    "'host_permissions' must be an array".to_string(),
                );
            }
        }

        let manifest = self.manifest;
        for permission in &manifest.permissions {
            let Some(tier) = permission_risk(permission) else {
                continue;
            };
            let message = format!("Permission '{permission}' carries {tier} risk");
            let finding = if tier >= RiskTier::High {
                Finding::warning(Permissions, "permission-risk", message)
            } else {
                Finding::info(Permissions, "permission-risk", message)
            };
            self.findings.push(finding);
        }

        for host in &manifest.host_permissions {
            if is_blocking_host_pattern(host) {
                self.error(
                    Permissions,
                    "permission-broad-host",
                    format!("'{host}' in host_permissions is too broad - specify specific hosts"),
                );
            }
        }
    }

    fn browser_specific(&mut self, target: BrowserKind) {
        use FindingCategory::Compatibility;
        let manifest = self.manifest;

        match target {
            BrowserKind::Firefox => {
                // Without settings the structure check already warned
                if manifest.is_mv3() && manifest.has_browser_specific_settings {
                    self.warning(
                        Compatibility,
                        "browser-firefox-mv3",
                        "Firefox has limited Manifest v3 support - test thoroughly".to_string(),
                    );
                }
                if manifest.is_mv2() && !manifest.has_browser_specific_settings {
                    self.warning(
                        Compatibility,
                        "browser-firefox-missing-settings",
                        "Missing 'browser_specific_settings' for Firefox (optional but recommended)"
                            .to_string(),
                    );
                }
            }
            BrowserKind::Chrome | BrowserKind::Edge | BrowserKind::Opera => {
                if manifest.is_mv2() {
                    self.warning(
                        Compatibility,
                        "browser-mv2-deprecated",
                        "Manifest v2 is deprecated - migrate to Manifest v3".to_string(),
                    );
                }
                if manifest.background.as_ref().map_or(false, |bg| bg.is_empty()) {
                    self.warning(
                        Compatibility,
                        "browser-empty-background",
                        "Empty 'background' object - consider adding service_worker or scripts"
                            .to_string(),
                    );
                }
                if target == BrowserKind::Edge && manifest.has_key("browser_specific_settings") {
                    self.warning(
                        Compatibility,
                        "browser-edge-firefox-settings",
                        "'browser_specific_settings' is typically for Firefox, not Edge".to_string(),
                    );
                }
            }
            BrowserKind::Safari => {}
        }
    }

    fn version_specific(&mut self) {
        use FindingCategory::ManifestVersion;
        let manifest = self.manifest;

        if manifest.is_mv3() {
            for key in ["page_action", "browser_action"] {
                if manifest.has_key(key) {
                    self.warning(
                        ManifestVersion,
                        "mv3-deprecated-action",
                        format!("'{key}' is deprecated in Manifest v3, use 'action' instead"),
                    );
                }
            }
            if !["action", "page_action", "browser_action"]
                .iter()
                .any(|key| manifest.has_key(key))
            {
                self.warning(
                    ManifestVersion,
                    "mv3-missing-action",
                    "No 'action' field specified (recommended for Manifest v3)".to_string(),
                );
            }
            if manifest.background.as_ref().map_or(false, |bg| !bg.scripts.is_empty())
                || self
                    .raw("background")
                    .and_then(|bg| bg.get("scripts"))
                    .is_some()
            {
                self.error(
                    ManifestVersion,
                    "mv3-background-scripts",
                    "'background.scripts' not supported in Manifest v3, use 'background.service_worker'"
                        .to_string(),
                );
            }
        } else if manifest.is_mv2() && !manifest.has_key("content_security_policy") {
            self.warning(
                ManifestVersion,
                "mv2-missing-csp",
                "No 'content_security_policy' specified (recommended for security)".to_string(),
            );
        }
    }

    fn performance(&mut self) {
        use FindingCategory::Performance;

        let total_bytes: u64 = collect_all_files(self.root)
            .iter()
            .filter_map(|path| std::fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum();
        let total_mb = bytes_to_mb(total_bytes);

        if total_mb > self.config.size_fail_mb {
            self.warning(
                Performance,
                "performance-large-size",
                format!("Extension size is large ({total_mb:.1} MB) - may slow down browser loading"),
            );
        }

        let count = self.manifest.permissions.len();
        if count > self.config.many_permissions_threshold {
            self.warning(
                Performance,
                "performance-many-permissions",
                format!("Extension has many permissions ({count}) - consider reducing for security"),
            );
        }
    }

    fn security(&mut self) {
        use FindingCategory::Security;
        let manifest = self.manifest;

        if let Some(csp) = manifest.content_security_policy.as_deref() {
            if csp.contains("unsafe-eval") {
                self.error(
                    Security,
                    "csp-unsafe-eval",
                    "'unsafe-eval' found in CSP - this is a security risk".to_string(),
                );
            }
            if csp.contains("unsafe-inline") {
                self.warning(
                    Security,
                    "csp-unsafe-inline",
                    "'unsafe-inline' in CSP can be a security risk - consider using nonces".to_string(),
                );
            }
        }

        if let Some(connectable) = &manifest.externally_connectable {
            if let Some(pattern) = connectable.matches.iter().find(|m| is_broad_host_pattern(m)) {
                self.error(
                    Security,
                    "security-externally-connectable-wildcard",
                    format!("'externally_connectable' with '{pattern}' is a security risk"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, manifest: &serde_json::Value) {
        fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
    }

    #[test]
    fn test_missing_manifest_is_single_error() {
        let dir = tempdir().unwrap();
        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Chrome);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["manifest.json not found in extension root"]);
        assert!(result.compatible_browsers.is_empty());
    }

    #[test]
    fn test_not_a_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let result = RuleEngine::default().validate(&file, BrowserKind::Chrome);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Extension path is not a directory"));
    }

    #[test]
    fn test_invalid_manifest_version() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({"manifest_version": 4, "name": "X", "version": "1", "description": "d"}),
        );
        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Chrome);
        assert!(result
            .errors
            .contains(&"Invalid manifest_version: 4 (must be 2 or 3)".to_string()));
    }

    #[test]
    fn test_wrong_type_name() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({"manifest_version": 3, "name": 5, "version": "1", "description": "d"}),
        );
        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Chrome);
        assert_eq!(result.error_codes().collect::<Vec<_>>(), vec!["manifest-wrong-type"]);
    }

    #[test]
    fn test_missing_referenced_files_are_errors() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({
                "manifest_version": 3,
                "name": "X",
                "version": "1",
                "description": "d",
                "icons": {"128": "icons/128.png", "16": "icons/16.png"},
                "content_scripts": [{"js": ["content.js"], "css": ["content.css"], "matches": ["https://example.com/*"]}],
                "background": {"service_worker": "sw.js"},
                "action": {}
            }),
        );
        fs::create_dir_all(dir.path().join("icons")).unwrap();
        fs::write(dir.path().join("icons/16.png"), b"png").unwrap();

        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Chrome);
        assert_eq!(
            result.errors,
            vec![
                "Icon file not found: icons/128.png",
                "Content script not found: content.js",
                "Content stylesheet not found: content.css",
                "Service worker not found: sw.js",
            ]
        );
    }

    #[test]
    fn test_path_escaping_root() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({
                "manifest_version": 2,
                "name": "X",
                "version": "1",
                "description": "d",
                "background": {"scripts": ["../outside.js"]}
            }),
        );
        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Firefox);
        assert!(result.has_code("file-path-escapes-root"));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_risk_tiers_are_advisory() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({
                "manifest_version": 3,
                "name": "X",
                "version": "1",
                "description": "d",
                "action": {},
                "permissions": ["debugger", "tabs", "storage"]
            }),
        );
        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Chrome);
        assert!(result.is_valid);
        assert!(result
            .warnings
            .contains(&"Permission 'debugger' carries Critical risk".to_string()));
        // Medium tier stays informational
        assert!(!result.warnings.iter().any(|w| w.contains("'tabs'")));
        assert!(result.findings.iter().any(|f| f.message.contains("'tabs'")));
    }

    #[test]
    fn test_browser_specific_rules() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({
                "manifest_version": 2,
                "name": "X",
                "version": "1",
                "description": "d",
                "background": {},
                "content_security_policy": "script-src 'self'",
                "browser_specific_settings": {"gecko": {"id": "x@y"}}
            }),
        );
        let engine = RuleEngine::default();

        let edge = engine.validate(dir.path(), BrowserKind::Edge);
        assert!(edge.has_code("browser-mv2-deprecated"));
        assert!(edge.has_code("browser-empty-background"));
        assert!(edge.has_code("browser-edge-firefox-settings"));

        let firefox = engine.validate(dir.path(), BrowserKind::Firefox);
        assert!(!firefox.has_code("browser-mv2-deprecated"));
        assert!(!firefox.has_code("browser-firefox-missing-settings"));
    }

    #[test]
    fn test_firefox_mv3_warned_once() {
        let dir = tempdir().unwrap();
        let mut manifest = serde_json::json!({
            "manifest_version": 3,
            "name": "X",
            "version": "1",
            "description": "d",
            "action": {}
        });
        write_manifest(dir.path(), &manifest);
        let engine = RuleEngine::default();

        let firefox = engine.validate(dir.path(), BrowserKind::Firefox);
        let limited: Vec<_> = firefox
            .warnings
            .iter()
            .filter(|w| w.contains("limited Manifest v3 support"))
            .collect();
        assert_eq!(limited.len(), 1);
        assert!(firefox.has_code("compat-firefox-limited-mv3"));

        manifest["browser_specific_settings"] = serde_json::json!({"gecko": {"id": "x@y"}});
        write_manifest(dir.path(), &manifest);
        let firefox = engine.validate(dir.path(), BrowserKind::Firefox);
        assert!(firefox.has_code("browser-firefox-mv3"));
        assert!(!firefox.has_code("compat-firefox-limited-mv3"));
    }

    #[test]
    fn test_bundled_size_counts_toward_performance() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({"manifest_version": 3, "name": "X", "version": "1"}),
        );
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        fs::File::create(dir.path().join("node_modules/lib/bundle.bin"))
            .unwrap()
            .set_len(60 * crate::constants::BYTES_PER_MB)
            .unwrap();

        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Chrome);
        assert!(result.has_code("performance-large-size"));
    }

    #[test]
    fn test_mv3_background_scripts_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bg.js"), "").unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({
                "manifest_version": 3,
                "name": "X",
                "version": "1",
                "description": "d",
                "action": {},
                "background": {"scripts": ["bg.js"]}
            }),
        );
        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Chrome);
        assert_eq!(result.error_codes().collect::<Vec<_>>(), vec!["mv3-background-scripts"]);
    }

    #[test]
    fn test_csp_and_externally_connectable() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            &serde_json::json!({
                "manifest_version": 2,
                "name": "X",
                "version": "1",
                "description": "d",
                "content_security_policy": "script-src 'self' 'unsafe-eval' 'unsafe-inline'",
                "externally_connectable": {"matches": ["*://*/*"]}
            }),
        );
        let result = RuleEngine::default().validate(dir.path(), BrowserKind::Safari);
        assert_eq!(
            result.error_codes().collect::<Vec<_>>(),
            vec!["csp-unsafe-eval", "security-externally-connectable-wildcard"]
        );
        assert!(result.has_code("csp-unsafe-inline"));
    }

    #[test]
    fn test_validate_all_skips_hidden_and_manifestless_dirs() {
        let dir = tempdir().unwrap();
        for name in ["alpha", ".hidden", "beta"] {
            let ext = dir.path().join(name);
            fs::create_dir_all(&ext).unwrap();
            write_manifest(
                &ext,
                &serde_json::json!({"manifest_version": 3, "name": name, "version": "1"}),
            );
        }
        fs::create_dir_all(dir.path().join("no-manifest")).unwrap();

        let results = RuleEngine::default().validate_all(dir.path(), BrowserKind::Chrome);
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["alpha", "beta"]);
        assert!(results.values().all(|r| r.is_valid));
    }
}
