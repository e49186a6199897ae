//! Pattern-based security scan of manifest and source files

use super::ExtensionScanner;
use crate::constants::{is_broad_host_pattern, MARKUP_EXTENSIONS, SCRIPT_EXTENSIONS};
use crate::models::{Finding, FindingCategory, RiskTier};
use crate::rules::{max_permission_risk, permission_risk};
use crate::CoreConfig;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Each source finding costs this many points
pub const FINDING_PENALTY: i64 = 6;
/// Each classified permission costs this many points
pub const PERMISSION_PENALTY: i64 = 8;

/// Dangerous source patterns, each reported at most once per file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPattern {
    Eval,
    NewFunction,
    InnerHtml,
    DocumentWrite,
    RemoteUrl,
    BroadHost,
    CspUnsafeEval,
    CspUnsafeInline,
}

impl SecurityPattern {
    pub const SOURCE: [Self; 5] = [
        Self::Eval,
        Self::NewFunction,
        Self::InnerHtml,
        Self::DocumentWrite,
        Self::RemoteUrl,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Self::Eval => "security-eval",
            Self::NewFunction => "security-new-function",
            Self::InnerHtml => "security-inner-html",
            Self::DocumentWrite => "security-document-write",
            Self::RemoteUrl => "security-remote-url",
            Self::BroadHost => "security-broad-host",
            Self::CspUnsafeEval => "csp-unsafe-eval",
            Self::CspUnsafeInline => "csp-unsafe-inline",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            Self::Eval,
            Self::NewFunction,
            Self::InnerHtml,
            Self::DocumentWrite,
            Self::RemoteUrl,
            Self::BroadHost,
            Self::CspUnsafeEval,
            Self::CspUnsafeInline,
        ]
        .into_iter()
        .find(|pattern| pattern.code() == code)
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Eval => "uses eval()",
            Self::NewFunction => "uses Function() constructor",
            Self::InnerHtml => "uses innerHTML (XSS risk)",
            Self::DocumentWrite => "uses document.write()",
            Self::RemoteUrl => "references remote URL",
            Self::BroadHost => "overly broad host permission",
            Self::CspUnsafeEval => "CSP allows 'unsafe-eval'",
            Self::CspUnsafeInline => "CSP allows 'unsafe-inline'",
        }
    }

    fn regex(self) -> Option<&'static Regex> {
        match self {
            Self::Eval => Some(&*EVAL),
            Self::NewFunction => Some(&*NEW_FUNCTION),
            Self::InnerHtml => Some(&*INNER_HTML),
            Self::DocumentWrite => Some(&*DOCUMENT_WRITE),
            Self::RemoteUrl => Some(&*REMOTE_URL),
            _ => None,
        }
    }
}

lazy_static::lazy_static! {
    static ref EVAL: Regex = Regex::new(r"\beval\s*\(").expect("eval pattern");
    static ref NEW_FUNCTION: Regex = Regex::new(r"\bnew\s+Function\b").expect("Function pattern");
    static ref INNER_HTML: Regex = Regex::new(r"\binnerHTML\b").expect("innerHTML pattern");
    static ref DOCUMENT_WRITE: Regex = Regex::new(r"\bdocument\.write\b").expect("document.write pattern");
    static ref REMOTE_URL: Regex = Regex::new(r"https?://").expect("remote url pattern");
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SecurityReport {
    pub findings: Vec<Finding>,
    pub permission_findings: Vec<Finding>,
    pub permission_risk: RiskTier,
    pub score: f64,
}

impl SecurityReport {
    /// Number of findings for a given pattern
    pub fn count(&self, pattern: SecurityPattern) -> usize {
        self.findings
            .iter()
            .filter(|f| f.code == pattern.code())
            .count()
    }

    /// Permission findings at High or Critical tier
    pub fn high_risk_permission_count(&self) -> usize {
        self.permission_findings
            .iter()
            .filter(|f| f.is_warning())
            .count()
    }
}

pub struct SecurityScanner {
    root: PathBuf,
    config: CoreConfig,
}

impl SecurityScanner {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }
}

impl ExtensionScanner for SecurityScanner {
    type Report = SecurityReport;

    fn scanner_name(&self) -> &'static str {
        "security"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> SecurityReport {
        let mut report = SecurityReport::default();

        if let Some(manifest) = self.load_manifest() {
            report.permission_risk = max_permission_risk(&manifest.permissions);
            for permission in &manifest.permissions {
                // Low-tier permissions are not reported
                let Some(tier) = permission_risk(permission).filter(|t| *t >= RiskTier::Medium) else {
                    continue;
                };
                let message = format!("Permission '{permission}' risk: {tier}");
                let finding = if tier >= RiskTier::High {
                    Finding::warning(FindingCategory::Permissions, "permission-risk", message)
                } else {
                    Finding::info(FindingCategory::Permissions, "permission-risk", message)
                };
                report.permission_findings.push(finding);
            }

            for host in manifest
                .host_permissions
                .iter()
                .filter(|h| is_broad_host_pattern(h))
            {
                report.findings.push(Finding::warning(
                    FindingCategory::Security,
                    SecurityPattern::BroadHost.code(),
                    format!("Overly broad host permission: {host}"),
                ));
                report.permission_risk = report.permission_risk.max(RiskTier::High);
            }

            if let Some(csp) = manifest.content_security_policy.as_deref() {
                if csp.contains("unsafe-eval") {
                    report.findings.push(pattern_finding(SecurityPattern::CspUnsafeEval, None));
                    report.permission_risk = report.permission_risk.max(RiskTier::High);
                }
                if csp.contains("unsafe-inline") {
                    report.findings.push(pattern_finding(SecurityPattern::CspUnsafeInline, None));
                    report.permission_risk = report.permission_risk.max(RiskTier::Medium);
                }
            }
        }

        let extensions: Vec<&str> = SCRIPT_EXTENSIONS
            .iter()
            .chain(MARKUP_EXTENSIONS.iter())
            .copied()
            .collect();

        for path in self.source_files(&extensions) {
            let Some(content) = self.read_source(&path) else {
                continue;
            };
            let location = self.relative(&path);
            for pattern in SecurityPattern::SOURCE {
                if pattern.regex().map_or(false, |re| re.is_match(&content)) {
                    report.findings.push(pattern_finding(pattern, Some(&location)));
                }
            }
        }

        report.score = risk_score(report.findings.len(), report.permission_findings.len());
        report
    }
}

fn pattern_finding(pattern: SecurityPattern, location: Option<&str>) -> Finding {
    let finding = Finding::warning(FindingCategory::Security, pattern.code(), pattern.describe());
    match location {
        Some(location) => finding.with_location(location),
        None => finding,
    }
}

/// `100 - 6 x findings - 8 x permission findings`, clamped to [0, 100]
#[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub fn risk_score(findings: usize, permission_findings: usize) -> f64 {
    let score = 100 - FINDING_PENALTY * findings as i64 - PERMISSION_PENALTY * permission_findings as i64;
    score.clamp(0, 100) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_risk_score_clamps() {
        assert!((risk_score(0, 0) - 100.0).abs() < f64::EPSILON);
        assert!((risk_score(1, 1) - 86.0).abs() < f64::EPSILON);
        assert!(risk_score(50, 50).abs() < f64::EPSILON);
    }

    #[test]
    fn test_critical_permissions_and_broad_host() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":3,"name":"B","version":"1.0",
                "permissions":["webRequestBlocking","debugger"],
                "host_permissions":["<all_urls>"]}"#,
        )
        .unwrap();

        let report = SecurityScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.permission_findings.len(), 2);
        assert_eq!(report.permission_risk, RiskTier::Critical);
        assert_eq!(report.count(SecurityPattern::BroadHost), 1);
        assert!(report.score <= 84.0);
    }

    #[test]
    fn test_low_tier_permissions_do_not_cost_points() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":3,"name":"S","version":"1.0","permissions":["storage","alarms"]}"#,
        )
        .unwrap();

        let report = SecurityScanner::new(dir.path(), CoreConfig::default()).scan();
        assert!(report.permission_findings.is_empty());
        assert_eq!(report.permission_risk, RiskTier::Low);
        assert!((report.score - 100.0).abs() < f64::EPSILON);

        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":3,"name":"S","version":"1.0","permissions":["storage","tabs"]}"#,
        )
        .unwrap();
        let report = SecurityScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.permission_findings.len(), 1);
        assert_eq!(report.permission_risk, RiskTier::Medium);
        assert!((report.score - 92.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_source_patterns_once_per_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("app.js"),
            "eval(a); eval(b);\nel.innerHTML = x;\nfetch('https://example.com');",
        )
        .unwrap();
        fs::write(dir.path().join("page.html"), "<script>document.write('x')</script>").unwrap();
        fs::write(dir.path().join("notes.txt"), "eval(ignored)").unwrap();

        let report = SecurityScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.count(SecurityPattern::Eval), 1);
        assert_eq!(report.count(SecurityPattern::InnerHtml), 1);
        assert_eq!(report.count(SecurityPattern::RemoteUrl), 1);
        assert_eq!(report.count(SecurityPattern::DocumentWrite), 1);
        assert_eq!(report.findings.len(), 4);
        assert_eq!(report.findings[0].location.as_deref(), Some("app.js"));
        assert!((report.score - 76.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_csp_findings_raise_risk() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":2,"name":"C","version":"1",
                "content_security_policy":"script-src 'self' 'unsafe-inline'"}"#,
        )
        .unwrap();

        let report = SecurityScanner::new(dir.path(), CoreConfig::default()).scan();
        assert_eq!(report.count(SecurityPattern::CspUnsafeInline), 1);
        assert_eq!(report.permission_risk, RiskTier::Medium);
    }

    #[test]
    fn test_missing_manifest_is_not_fatal() {
        let dir = tempdir().unwrap();
        let report = SecurityScanner::new(dir.path(), CoreConfig::default()).scan();
        assert!(report.findings.is_empty());
        assert!((report.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_code() {
        assert_eq!(SecurityPattern::from_code("security-eval"), Some(SecurityPattern::Eval));
        assert_eq!(SecurityPattern::from_code("nope"), None);
    }
}
