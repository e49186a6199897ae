//! Rule engine output

use super::{BrowserKind, Finding, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of validating one extension against one target browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub compatible_browsers: BTreeSet<BrowserKind>,
    /// Every finding in check order, including informational ones
    pub findings: Vec<Finding>,
}

impl ValidationResult {
    pub fn from_findings(findings: Vec<Finding>, compatible_browsers: BTreeSet<BrowserKind>) -> Self {
        let (errors, warnings) = super::finding::partition_messages(&findings);
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            compatible_browsers,
            findings,
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }

    /// Codes of all error-severity findings, in order
    pub fn error_codes(&self) -> impl Iterator<Item = &str> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .map(|f| f.code.as_str())
    }
}
