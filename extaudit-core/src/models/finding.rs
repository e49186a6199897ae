//! Findings produced by the rule engine and scanners

use serde::{Deserialize, Serialize};

/// How much a finding matters. Only errors affect validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Where a finding came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Structure,
    Files,
    Permissions,
    Compatibility,
    ManifestVersion,
    Performance,
    Security,
    Store,
    Privacy,
    Dependency,
    Network,
    Size,
    Lint,
    Api,
    Runtime,
}

/// Sensitivity tier of a requested permission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        write!(f, "{name}")
    }
}

/// A single detected issue.
///
/// `code` is a stable machine-readable identifier (`manifest-missing-field`,
/// `security-eval`, ...); `message` is for humans and may change wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: FindingCategory,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Finding {
    pub fn new(
        severity: Severity,
        category: FindingCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn error(category: FindingCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, code, message)
    }

    pub fn warning(category: FindingCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, code, message)
    }

    pub fn info(category: FindingCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, code, message)
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Split findings into rendered error and warning strings, preserving order.
/// Info findings are dropped.
pub fn partition_messages<'a, I>(findings: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = &'a Finding>,
{
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for finding in findings {
        match finding.severity {
            Severity::Error => errors.push(finding.to_string()),
            Severity::Warning => warnings.push(finding.to_string()),
            Severity::Info => {}
        }
    }
    (errors, warnings)
}
