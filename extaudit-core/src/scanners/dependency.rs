//! Bundled and declared third-party library detection

use super::ExtensionScanner;
use crate::models::{Finding, FindingCategory};
use crate::CoreConfig;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// (library, vulnerable version prefixes, recommendation)
const KNOWN_VULNERABLE: [(&str, &[&str], &str); 2] = [
    (
        "jquery",
        &["1.", "2.", "3.0", "3.1", "3.2", "3.3", "3.4"],
        "Upgrade to >= 3.5.0",
    ),
    ("lodash", &["4.17.19", "4.17.20"], "Upgrade to >= 4.17.21"),
];

lazy_static::lazy_static! {
    static ref BUNDLED: Vec<(&'static str, Regex)> = ["jquery", "lodash", "moment"]
        .into_iter()
        .map(|lib| {
            let regex = Regex::new(&format!(r"{lib}[-.](\d+\.\d+\.\d+)")).expect("library pattern");
            (lib, regex)
        })
        .collect();
}

/// Where a library version came from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum LibrarySource {
    BundledFile(String),
    PackageJson,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DetectedLibrary {
    pub name: String,
    pub version: String,
    pub source: LibrarySource,
}

impl std::fmt::Display for DetectedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            LibrarySource::BundledFile(path) => {
                write!(f, "{} {} (bundled file: {path})", self.name, self.version)
            }
            LibrarySource::PackageJson => write!(f, "{} {} (package.json)", self.name, self.version),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyReport {
    pub detected: Vec<DetectedLibrary>,
    pub findings: Vec<Finding>,
}

pub struct DependencyScanner {
    root: PathBuf,
    config: CoreConfig,
}

impl DependencyScanner {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    fn declared(&self, detected: &mut BTreeSet<DetectedLibrary>, findings: &mut BTreeSet<String>) {
        let path = self.root.join("package.json");
        if !path.is_file() {
            return;
        }
        let Some(text) = self.read_source(&path) else {
            return;
        };

        let package: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("dependency: invalid package.json: {}", e);
                findings.insert("package.json is invalid JSON".to_string());
                return;
            }
        };

        for section in ["dependencies", "devDependencies"] {
            let Some(deps) = package.get(section).and_then(serde_json::Value::as_object) else {
                continue;
            };
            for (name, version) in deps {
                let Some(version) = version.as_str() else {
                    continue;
                };
                let version = strip_range(version);
                if let Some(warning) = vulnerability(name, version) {
                    findings.insert(warning);
                }
                detected.insert(DetectedLibrary {
                    name: name.clone(),
                    version: version.to_string(),
                    source: LibrarySource::PackageJson,
                });
            }
        }
    }
}

impl ExtensionScanner for DependencyScanner {
    type Report = DependencyReport;

    fn scanner_name(&self) -> &'static str {
        "dependency"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> DependencyReport {
        let mut detected = BTreeSet::new();
        let mut warnings = BTreeSet::new();

        self.declared(&mut detected, &mut warnings);

        for path in self.source_files(&["js"]) {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let file_name = file_name.to_lowercase();
            for (lib, regex) in BUNDLED.iter() {
                let Some(version) = regex.captures(&file_name).and_then(|c| c.get(1)) else {
                    continue;
                };
                let version = version.as_str();
                if let Some(warning) = vulnerability(lib, version) {
                    warnings.insert(warning);
                }
                detected.insert(DetectedLibrary {
                    name: (*lib).to_string(),
                    version: version.to_string(),
                    source: LibrarySource::BundledFile(self.relative(&path)),
                });
            }
        }

        DependencyReport {
            detected: detected.into_iter().collect(),
            findings: warnings
                .into_iter()
                .map(|message| {
                    let code = if message.starts_with("package.json") {
                        "dependency-invalid-package-json"
                    } else {
                        "dependency-vulnerable"
                    };
                    Finding::warning(FindingCategory::Dependency, code, message)
                })
                .collect(),
        }
    }
}

/// `^1.2.3`, `~1.2.3`, `>=1.2.3`, `v1.2.3` all become `1.2.3`
fn strip_range(version: &str) -> &str {
    version.trim_start_matches(|c| matches!(c, '^' | '~' | '>' | '=' | 'v' | ' '))
}

fn vulnerability(lib: &str, version: &str) -> Option<String> {
    let (_, prefixes, recommendation) = KNOWN_VULNERABLE.iter().find(|(name, _, _)| *name == lib)?;
    prefixes
        .iter()
        .any(|prefix| version.starts_with(prefix))
        .then(|| format!("{lib} {version} may be vulnerable. {recommendation}"))
}
