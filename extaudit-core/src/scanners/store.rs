//! Store publication readiness (Chrome Web Store, Edge Add-ons, Firefox AMO)

use super::privacy::{PrivacyReport, PrivacyScanner};
use super::ExtensionScanner;
use crate::constants::is_blocking_host_pattern;
use crate::models::{Finding, FindingCategory, ManifestDocument, Store};
use crate::CoreConfig;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Score deductions applied per store
#[derive(Debug, Clone, Copy)]
pub struct StoreDeductions;

impl StoreDeductions {
    pub const MISSING_ICONS: i64 = 10;
    pub const PER_PERMISSION_WARNING: i64 = 5;
    pub const PERMISSION_CAP: i64 = 20;
    pub const REMOTE_CODE: i64 = 20;
    pub const OBFUSCATION: i64 = 10;
    pub const NO_PRIVACY_POLICY: i64 = 15;
}

const DANGEROUS_PERMISSIONS: [(&str, &str); 5] = [
    ("tabs", "Sensitive permission"),
    ("webRequestBlocking", "High risk permission"),
    ("debugger", "Not allowed for public store extensions"),
    ("history", "Sensitive user data"),
    ("clipboardRead", "Sensitive user data"),
];

lazy_static::lazy_static! {
    static ref REMOTE_CODE: Vec<Regex> = vec![
        Regex::new(r#"(?i)<script[^>]+src=["']https?://"#).expect("script src pattern"),
        Regex::new(r#"(?i)\bimportScripts\s*\(\s*['"]https?://"#).expect("importScripts pattern"),
        Regex::new(r#"(?i)\bfetch\s*\(\s*['"]https?://[^'"]+\.js"#).expect("remote fetch pattern"),
    ];
    static ref OBFUSCATION: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"[A-Za-z0-9+/]{120,}={0,2}").expect("base64 pattern"), "Possible base64 obfuscation"),
        (Regex::new(r"eval\s*\(\s*function\(p,a,c,k,e,d\)").expect("packer pattern"), "Packed/obfuscated code detected"),
        (Regex::new(r"eval\s*\(\s*atob\(").expect("atob pattern"), "eval(atob()) pattern detected"),
    ];
}

/// Readiness for one store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreResult {
    pub score: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreReport {
    pub stores: BTreeMap<Store, StoreResult>,
    pub privacy: PrivacyReport,
}

impl StoreReport {
    /// Mean score across the checked stores, 100 when none were checked
    #[allow(clippy::cast_precision_loss)]
    pub fn average_score(&self) -> f64 {
        if self.stores.is_empty() {
            return 100.0;
        }
        self.stores.values().map(|s| s.score).sum::<f64>() / self.stores.len() as f64
    }
}

pub struct StoreComplianceScanner {
    root: PathBuf,
    config: CoreConfig,
    stores: Vec<Store>,
    privacy: PrivacyScanner,
}

impl StoreComplianceScanner {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            privacy: PrivacyScanner::new(&root, config.clone()),
            root,
            config,
            stores: Store::ALL.to_vec(),
        }
    }

    #[must_use]
    pub fn with_stores(mut self, stores: &[Store]) -> Self {
        self.stores = stores.to_vec();
        self
    }

    /// Disable policy URL probing in the embedded privacy scan
    #[must_use]
    pub fn without_reachability(mut self) -> Self {
        self.privacy = self.privacy.without_reachability();
        self
    }

    #[must_use]
    pub fn with_reachability(mut self, checker: Arc<dyn super::UrlChecker>) -> Self {
        self.privacy = self.privacy.with_reachability(checker);
        self
    }

    fn missing_icons(&self, manifest: &ManifestDocument, store: Store) -> Vec<u32> {
        store
            .required_icon_sizes()
            .iter()
            .copied()
            .filter(|size| {
                manifest.icons.get(&size.to_string()).map_or(true, |path| {
                    extaudit_utils::safe_path_join(&self.root, Path::new(path))
                        .map_or(true, |full| !full.exists())
                })
            })
            .collect()
    }

    fn permission_warnings(manifest: &ManifestDocument) -> Vec<String> {
        let mut warnings: Vec<String> = manifest
            .permissions
            .iter()
            .filter_map(|perm| {
                DANGEROUS_PERMISSIONS
                    .iter()
                    .find(|(name, _)| *name == perm.as_str())
                    .map(|(name, reason)| format!("Permission risk: {name} ({reason})"))
            })
            .collect();

        for host in manifest
            .host_permissions
            .iter()
            .filter(|h| is_blocking_host_pattern(h))
        {
            warnings.push(format!("Overly broad host permission: {host}"));
        }

        warnings
    }

    fn remote_code(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for path in self.source_files(&["html", "js"]) {
            let Some(content) = self.read_source(&path) else {
                continue;
            };
            if REMOTE_CODE.iter().any(|re| re.is_match(&content)) {
                let kind = if path.extension().map_or(false, |e| e == "html") {
                    "Remote script reference detected in"
                } else {
                    "Remote code load detected in"
                };
                errors.push(format!("{kind} {}", self.relative(&path)));
            }
        }
        errors
    }

    fn obfuscation(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for path in self.source_files(&["js"]) {
            let Some(content) = self.read_source(&path) else {
                continue;
            };
            let file = self.relative(&path);
            for (regex, label) in OBFUSCATION.iter() {
                if regex.is_match(&content) {
                    warnings.push(format!("{label} in {file}"));
                }
            }
        }
        warnings
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
    fn check_store(
        &self,
        store: Store,
        manifest: &ManifestDocument,
        remote_code: &[String],
        obfuscation: &[String],
        privacy: &PrivacyReport,
    ) -> StoreResult {
        let mut result = StoreResult::default();
        let mut score: i64 = 100;

        let missing = self.missing_icons(manifest, store);
        if !missing.is_empty() {
            let sizes: Vec<String> = missing.iter().map(ToString::to_string).collect();
            result.findings.push(Finding::warning(
                FindingCategory::Store,
                "store-missing-icons",
                format!("Missing icons for {}: {}", store.key(), sizes.join(", ")),
            ));
            score -= StoreDeductions::MISSING_ICONS;
        }

        let permission_warnings = Self::permission_warnings(manifest);
        if !permission_warnings.is_empty() {
            score -= (StoreDeductions::PER_PERMISSION_WARNING * permission_warnings.len() as i64)
                .min(StoreDeductions::PERMISSION_CAP);
            result.findings.extend(permission_warnings.into_iter().map(|message| {
                Finding::warning(FindingCategory::Store, "store-dangerous-permission", message)
            }));
        }

        if !remote_code.is_empty() {
            result.findings.extend(remote_code.iter().map(|message| {
                Finding::error(FindingCategory::Store, "store-remote-code", message.clone())
            }));
            score -= StoreDeductions::REMOTE_CODE;
        }

        if !obfuscation.is_empty() {
            result.findings.extend(obfuscation.iter().map(|message| {
                Finding::warning(FindingCategory::Store, "store-obfuscation", message.clone())
            }));
            score -= StoreDeductions::OBFUSCATION;
        }

        if !privacy.data_indicators.is_empty() && !privacy.has_policy() {
            result.findings.push(Finding::warning(
                FindingCategory::Store,
                "store-no-privacy-policy",
                "Data collection detected but no privacy policy found",
            ));
            score -= StoreDeductions::NO_PRIVACY_POLICY;
        }

        let (errors, warnings) = crate::models::finding::partition_messages(&result.findings);
        result.errors = errors;
        result.warnings = warnings;
        result.score = score.clamp(0, 100) as f64;
        result
    }
}

impl ExtensionScanner for StoreComplianceScanner {
    type Report = StoreReport;

    fn scanner_name(&self) -> &'static str {
        "store"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> StoreReport {
        let privacy = self.privacy.scan();

        let Some(manifest) = self.load_manifest() else {
            let stores = self
                .stores
                .iter()
                .map(|store| {
                    let finding = Finding::error(
                        FindingCategory::Store,
                        "store-manifest-invalid",
                        "manifest.json missing or invalid",
                    );
                    let result = StoreResult {
                        score: 0.0,
                        errors: vec![finding.message.clone()],
                        warnings: Vec::new(),
                        findings: vec![finding],
                    };
                    (*store, result)
                })
                .collect();
            return StoreReport { stores, privacy };
        };

        let remote_code = self.remote_code();
        let obfuscation = self.obfuscation();

        let stores = self
            .stores
            .iter()
            .map(|store| {
                (
                    *store,
                    self.check_store(*store, &manifest, &remote_code, &obfuscation, &privacy),
                )
            })
            .collect();

        StoreReport { stores, privacy }
    }
}
