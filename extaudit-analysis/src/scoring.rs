//! Weighted quality score
//!
//! Five category scores, each clamped to [0, 100], reduced to one weighted
//! final score and a letter grade. Every input section that is absent from
//! the record scores as optimal. The calculation is a pure function of the
//! record and the [`ScoringConfig`].

use crate::record::ExtensionRecord;
use extaudit_core::scanners::SecurityPattern;
use extaudit_core::{Error, Result, RiskTier, Severity};
use serde::{Deserialize, Serialize};

/// Category weights. The defaults sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub security: f64,
    pub performance: f64,
    pub store_compliance: f64,
    pub code_quality: f64,
    pub privacy: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            security: 0.30,
            performance: 0.20,
            store_compliance: 0.20,
            code_quality: 0.15,
            privacy: 0.15,
        }
    }
}

impl ScoreWeights {
    const TOLERANCE: f64 = 0.001;

    pub fn sum(&self) -> f64 {
        self.security + self.performance + self.store_compliance + self.code_quality + self.privacy
    }

    /// Weights must be non-negative and sum to 1.0
    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.security,
            self.performance,
            self.store_compliance,
            self.code_quality,
            self.privacy,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config(format!("score weights must be non-negative: {self:?}")));
        }
        if (self.sum() - 1.0).abs() > Self::TOLERANCE {
            return Err(Error::Config(format!(
                "score weights must sum to 1.0, got {:.3}",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// Every deduction applied by the engine, in points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeductionTable {
    // security
    pub critical_pattern: f64,
    pub high_pattern: f64,
    pub risky_permission: f64,
    // performance
    pub size_over_10mb: f64,
    pub size_over_5mb: f64,
    pub size_over_2mb: f64,
    pub files_over_500: f64,
    pub files_over_200: f64,
    pub largest_over_5mb: f64,
    pub largest_over_2mb: f64,
    // store compliance
    pub manifest_error: f64,
    pub broad_permission_error: f64,
    pub missing_icon_error: f64,
    pub missing_name: f64,
    pub missing_version: f64,
    pub missing_description: f64,
    // code quality
    pub validation_error: f64,
    pub validation_warning: f64,
    pub dom_sink: f64,
    // privacy
    pub missing_privacy_policy: f64,
    pub tracking_domain: f64,
    pub analytics: f64,
    pub storage_access: f64,
    pub critical_permission_risk: f64,
    pub high_permission_risk: f64,
    pub medium_permission_risk: f64,
}

impl Default for DeductionTable {
    fn default() -> Self {
        Self {
            critical_pattern: 15.0,
            high_pattern: 10.0,
            risky_permission: 5.0,
            size_over_10mb: 30.0,
            size_over_5mb: 15.0,
            size_over_2mb: 5.0,
            files_over_500: 20.0,
            files_over_200: 10.0,
            largest_over_5mb: 15.0,
            largest_over_2mb: 8.0,
            manifest_error: 10.0,
            broad_permission_error: 15.0,
            missing_icon_error: 5.0,
            missing_name: 20.0,
            missing_version: 15.0,
            missing_description: 10.0,
            validation_error: 8.0,
            validation_warning: 3.0,
            dom_sink: 5.0,
            missing_privacy_policy: 20.0,
            tracking_domain: 15.0,
            analytics: 10.0,
            storage_access: 5.0,
            critical_permission_risk: 30.0,
            high_permission_risk: 20.0,
            medium_permission_risk: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub deductions: DeductionTable,
}

impl ScoringConfig {
    /// Load from a TOML/JSON/YAML file and validate the weights
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let config: Self = extaudit_utils::load_config(path)?;
        config.weights.validate()?;
        Ok(config)
    }
}

/// Letter grade, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    D,
    F,
}

impl Grade {
    const STEPS: [(f64, Self); 10] = [
        (95.0, Self::APlus),
        (90.0, Self::A),
        (85.0, Self::AMinus),
        (80.0, Self::BPlus),
        (75.0, Self::B),
        (70.0, Self::BMinus),
        (65.0, Self::CPlus),
        (60.0, Self::C),
        (55.0, Self::CMinus),
        (50.0, Self::D),
    ];

    pub fn from_score(score: f64) -> Self {
        Self::STEPS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map_or(Self::F, |(_, grade)| *grade)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub raw_score: f64,
    pub weight: f64,
    pub weighted_contribution: f64,
}

impl CategoryScore {
    fn new(raw_score: f64, weight: f64) -> Self {
        Self {
            raw_score,
            weight,
            weighted_contribution: round2(raw_score * weight),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub security: CategoryScore,
    pub performance: CategoryScore,
    pub store_compliance: CategoryScore,
    pub code_quality: CategoryScore,
    pub privacy: CategoryScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub value: f64,
    pub grade: Grade,
    pub breakdown: ScoreBreakdown,
    pub recommendations: Vec<String>,
}

pub mod recommendations {
    pub const REMOVE_EVAL: &str = "CRITICAL: Remove eval() usage - Chrome Web Store will reject this";
    pub const REMOVE_UNSAFE_EVAL: &str = "CRITICAL: Remove 'unsafe-eval' from CSP";
    pub const ADD_PRIVACY_POLICY: &str =
        "Add a privacy policy URL (required for sensitive permissions)";
    pub const REDUCE_SIZE: &str =
        "Reduce extension size - consider minification and removing unused assets";
    pub const ADD_ICONS: &str = "Add all required icon sizes (16x16, 48x48, 128x128)";
    pub const MIGRATE_MV3: &str = "Migrate to Manifest V3 - Manifest V2 is being phased out";
    pub const ALL_GOOD: &str = "No critical issues found - extension looks good!";
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn points(count: usize, each: f64) -> f64 {
    count as f64 * each
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn calculate_final_score(&self, record: &ExtensionRecord) -> FinalScore {
        let weights = &self.config.weights;
        let breakdown = ScoreBreakdown {
            security: CategoryScore::new(self.security_score(record), weights.security),
            performance: CategoryScore::new(self.performance_score(record), weights.performance),
            store_compliance: CategoryScore::new(
                self.store_compliance_score(record),
                weights.store_compliance,
            ),
            code_quality: CategoryScore::new(self.code_quality_score(record), weights.code_quality),
            privacy: CategoryScore::new(self.privacy_score(record), weights.privacy),
        };

        let total = clamp(
            [
                &breakdown.security,
                &breakdown.performance,
                &breakdown.store_compliance,
                &breakdown.code_quality,
                &breakdown.privacy,
            ]
            .iter()
            .map(|c| c.raw_score * c.weight)
            .sum(),
        );

        FinalScore {
            value: round2(total),
            grade: Grade::from_score(total),
            breakdown,
            recommendations: Self::recommendations(record),
        }
    }

    pub fn security_score(&self, record: &ExtensionRecord) -> f64 {
        let Some(security) = &record.security else {
            return 100.0;
        };
        let d = &self.config.deductions;

        let critical = security.count(SecurityPattern::Eval) + security.count(SecurityPattern::CspUnsafeEval);
        let high = security.count(SecurityPattern::CspUnsafeInline) + security.count(SecurityPattern::RemoteUrl);

        clamp(
            security.score
                - points(critical, d.critical_pattern)
                - points(high, d.high_pattern)
                - points(security.high_risk_permission_count(), d.risky_permission),
        )
    }

    pub fn performance_score(&self, record: &ExtensionRecord) -> f64 {
        let Some(perf) = &record.performance else {
            return 100.0;
        };
        let d = &self.config.deductions;
        let mut score = 100.0;

        score -= if perf.total_size_mb > 10.0 {
            d.size_over_10mb
        } else if perf.total_size_mb > 5.0 {
            d.size_over_5mb
        } else if perf.total_size_mb > 2.0 {
            d.size_over_2mb
        } else {
            0.0
        };

        score -= if perf.file_count > 500 {
            d.files_over_500
        } else if perf.file_count > 200 {
            d.files_over_200
        } else {
            0.0
        };

        score -= if perf.largest_file_mb > 5.0 {
            d.largest_over_5mb
        } else if perf.largest_file_mb > 2.0 {
            d.largest_over_2mb
        } else {
            0.0
        };

        clamp(score)
    }

    pub fn store_compliance_score(&self, record: &ExtensionRecord) -> f64 {
        let d = &self.config.deductions;
        let mut score = 100.0;

        for result in record.browsers.values() {
            for code in result.error_codes() {
                if code.starts_with("manifest-") {
                    score -= d.manifest_error;
                }
                if code == "permission-broad-host" {
                    score -= d.broad_permission_error;
                }
                if code == "file-missing-icon" {
                    score -= d.missing_icon_error;
                }
            }
        }

        if let Some(meta) = &record.meta {
            if meta.name.is_none() {
                score -= d.missing_name;
            }
            if meta.version.is_none() {
                score -= d.missing_version;
            }
            if meta.description.is_none() {
                score -= d.missing_description;
            }
        }

        clamp(score)
    }

    pub fn code_quality_score(&self, record: &ExtensionRecord) -> f64 {
        let d = &self.config.deductions;
        let errors: usize = record.browsers.values().map(|r| r.errors.len()).sum();
        let warnings: usize = record.browsers.values().map(|r| r.warnings.len()).sum();

        let sinks = record.security.as_ref().map_or(0, |security| {
            security.count(SecurityPattern::InnerHtml) + security.count(SecurityPattern::DocumentWrite)
        });

        clamp(
            100.0
                - points(errors, d.validation_error)
                - points(warnings, d.validation_warning)
                - points(sinks, d.dom_sink),
        )
    }

    pub fn privacy_score(&self, record: &ExtensionRecord) -> f64 {
        let d = &self.config.deductions;
        let mut score = 100.0;

        if let Some(privacy) = &record.privacy {
            let missing_policy = privacy
                .findings
                .iter()
                .filter(|f| f.code == "privacy-missing-policy")
                .count();
            score -= points(missing_policy, d.missing_privacy_policy);
            score -= points(privacy.indicators_of("analytics").count(), d.analytics);
            score -= points(
                privacy.indicators_of("cookies_api").count() + privacy.indicators_of("storage").count(),
                d.storage_access,
            );
        }

        if let Some(network) = &record.network {
            score -= points(network.tracking_count(), d.tracking_domain);
        }

        if let Some(security) = &record.security {
            score -= match security.permission_risk {
                RiskTier::Critical => d.critical_permission_risk,
                RiskTier::High => d.high_permission_risk,
                RiskTier::Medium => d.medium_permission_risk,
                RiskTier::Low => 0.0,
            };
        }

        clamp(score)
    }

    /// Ordered, de-duplicated advice; one positive line when nothing applies
    pub fn recommendations(record: &ExtensionRecord) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |line: String| {
            if !out.contains(&line) {
                out.push(line);
            }
        };

        if let Some(security) = &record.security {
            if security.count(SecurityPattern::Eval) > 0 {
                push(recommendations::REMOVE_EVAL.to_string());
            }
            if security.count(SecurityPattern::CspUnsafeEval) > 0 {
                push(recommendations::REMOVE_UNSAFE_EVAL.to_string());
            }
        }

        if let Some(privacy) = &record.privacy {
            if privacy.findings.iter().any(|f| f.code == "privacy-missing-policy") {
                push(recommendations::ADD_PRIVACY_POLICY.to_string());
            }
        }

        if let Some(perf) = &record.performance {
            if perf.total_size_mb > 5.0 {
                push(recommendations::REDUCE_SIZE.to_string());
            }
            if perf.largest_file_mb > 2.0 {
                push(format!(
                    "Largest file is {}MB - consider splitting or compressing",
                    perf.largest_file_mb
                ));
            }
        }

        let has = |code: &str, severity: Severity| {
            record
                .browsers
                .values()
                .flat_map(|r| r.findings.iter())
                .any(|f| f.code == code && f.severity == severity)
        };
        if has("file-missing-icon", Severity::Error) {
            push(recommendations::ADD_ICONS.to_string());
        }
        if has("browser-mv2-deprecated", Severity::Warning) {
            push(recommendations::MIGRATE_MV3.to_string());
        }

        if out.is_empty() {
            out.push(recommendations::ALL_GOOD.to_string());
        }
        out
    }
}

/// Score a record with the default weights and deductions
pub fn calculate_final_score(record: &ExtensionRecord) -> FinalScore {
    ScoringEngine::default().calculate_final_score(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ExtensionMeta, PerformanceMetrics};
    use extaudit_core::scanners::{PrivacyReport, SecurityReport};
    use extaudit_core::{BrowserKind, Finding, FindingCategory, ValidationResult};
    use std::collections::BTreeSet;

    fn security(codes: &[&str], score: f64) -> SecurityReport {
        SecurityReport {
            findings: codes
                .iter()
                .map(|code| Finding::warning(FindingCategory::Security, *code, "x"))
                .collect(),
            score,
            ..SecurityReport::default()
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = ScoreWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert!(weights.validate().is_ok());

        let skewed = ScoreWeights {
            security: 0.5,
            ..ScoreWeights::default()
        };
        assert!(skewed.validate().is_err());

        let negative = ScoreWeights {
            security: -0.1,
            performance: 0.6,
            ..ScoreWeights::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_grade_steps() {
        assert_eq!(Grade::from_score(100.0), Grade::APlus);
        assert_eq!(Grade::from_score(95.0), Grade::APlus);
        assert_eq!(Grade::from_score(94.99), Grade::A);
        assert_eq!(Grade::from_score(72.0), Grade::BMinus);
        assert_eq!(Grade::from_score(50.0), Grade::D);
        assert_eq!(Grade::from_score(49.9), Grade::F);
        assert_eq!(serde_json::to_string(&Grade::CPlus).unwrap(), "\"C+\"");
    }

    #[test]
    fn test_empty_record_is_optimal() {
        let score = calculate_final_score(&ExtensionRecord::default());
        assert!((score.value - 100.0).abs() < f64::EPSILON);
        assert_eq!(score.grade, Grade::APlus);
        assert_eq!(score.recommendations, vec![recommendations::ALL_GOOD]);
    }

    #[test]
    fn test_security_deductions() {
        let record = ExtensionRecord {
            security: Some(security(&["security-eval", "csp-unsafe-inline", "security-remote-url"], 82.0)),
            ..ExtensionRecord::default()
        };
        let engine = ScoringEngine::default();
        // 82 - 15 - 10 - 10
        assert!((engine.security_score(&record) - 47.0).abs() < f64::EPSILON);
        assert_eq!(
            ScoringEngine::recommendations(&record),
            vec![recommendations::REMOVE_EVAL]
        );
    }

    #[test]
    fn test_performance_tiers() {
        let engine = ScoringEngine::default();
        let record = |total, files, largest| ExtensionRecord {
            performance: Some(PerformanceMetrics {
                total_size_mb: total,
                file_count: files,
                largest_file_mb: largest,
            }),
            ..ExtensionRecord::default()
        };
        assert!((engine.performance_score(&record(1.0, 10, 0.5)) - 100.0).abs() < f64::EPSILON);
        assert!((engine.performance_score(&record(3.0, 250, 3.0)) - 77.0).abs() < f64::EPSILON);
        assert!((engine.performance_score(&record(60.0, 600, 60.0)) - 35.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_store_and_code_quality_from_validation() {
        let findings = vec![
            Finding::error(FindingCategory::Structure, "manifest-missing-field", "Missing required field: version"),
            Finding::error(FindingCategory::Permissions, "permission-broad-host", "broad"),
            Finding::warning(FindingCategory::Compatibility, "browser-mv2-deprecated", "mv2"),
        ];
        let record = ExtensionRecord {
            meta: Some(ExtensionMeta {
                name: Some("T".to_string()),
                version: None,
                description: None,
            }),
            browsers: [(BrowserKind::Chrome, ValidationResult::from_findings(findings, BTreeSet::new()))]
                .into_iter()
                .collect(),
            ..ExtensionRecord::default()
        };
        let engine = ScoringEngine::default();
        // 100 - 10 - 15 - 15 - 10
        assert!((engine.store_compliance_score(&record) - 50.0).abs() < f64::EPSILON);
        // 100 - 2x8 - 3
        assert!((engine.code_quality_score(&record) - 81.0).abs() < f64::EPSILON);
        assert_eq!(
            ScoringEngine::recommendations(&record),
            vec![recommendations::MIGRATE_MV3]
        );
    }

    #[test]
    fn test_privacy_deductions() {
        let record = ExtensionRecord {
            privacy: Some(PrivacyReport {
                data_indicators: vec![
                    "analytics: bg.js".to_string(),
                    "storage: bg.js".to_string(),
                    "cookies_api: popup.js".to_string(),
                ],
                findings: vec![Finding::warning(
                    FindingCategory::Privacy,
                    "privacy-missing-policy",
                    "no policy",
                )],
                ..PrivacyReport::default()
            }),
            security: Some(SecurityReport {
                permission_risk: RiskTier::High,
                score: 100.0,
                ..SecurityReport::default()
            }),
            ..ExtensionRecord::default()
        };
        let engine = ScoringEngine::default();
        // 100 - 20 - 10 - 2x5 - 20
        assert!((engine.privacy_score(&record) - 40.0).abs() < f64::EPSILON);
        assert!(ScoringEngine::recommendations(&record)
            .contains(&recommendations::ADD_PRIVACY_POLICY.to_string()));
    }

    #[test]
    fn test_custom_deductions_apply() {
        let config = ScoringConfig {
            deductions: DeductionTable {
                critical_pattern: 0.0,
                ..DeductionTable::default()
            },
            ..ScoringConfig::default()
        };
        let record = ExtensionRecord {
            security: Some(security(&["security-eval"], 94.0)),
            ..ExtensionRecord::default()
        };
        assert!((ScoringEngine::new(config).security_score(&record) - 94.0).abs() < f64::EPSILON);
    }
}
