//! Browser automation contract
//!
//! The pipeline never drives a browser itself. Stages 4 and 5 hand a
//! [`LaunchRequest`] to a [`BrowserAutomation`] implementation and only look
//! at the [`AutomationOutcome`] it returns. Failures are opaque
//! (`anyhow::Error`) and end up as a single error string on the stage.

use async_trait::async_trait;
use extaudit_core::{BrowserKind, ManifestStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to load and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub extension_path: PathBuf,
    pub browser: BrowserKind,
    pub headless: bool,
    /// Identifier resolved by an earlier session for the same browser
    pub extension_id: Option<String>,
}

impl LaunchRequest {
    pub fn new(extension_path: impl Into<PathBuf>, browser: BrowserKind, headless: bool) -> Self {
        Self {
            extension_path: extension_path.into(),
            browser,
            headless,
            extension_id: None,
        }
    }

    #[must_use]
    pub fn with_extension_id(mut self, extension_id: Option<String>) -> Self {
        self.extension_id = extension_id;
        self
    }
}

/// Result of one automation session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationOutcome {
    pub success: bool,
    /// Console warnings captured during the session
    pub console_logs: Vec<String>,
    pub errors: Vec<String>,
    pub screenshots: Vec<PathBuf>,
    pub extension_loaded: bool,
    pub extension_id: Option<String>,
}

impl AutomationOutcome {
    pub fn loaded(extension_id: Option<String>) -> Self {
        Self {
            success: true,
            extension_loaded: true,
            extension_id,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }
}

/// A collaborator that can load an unpacked extension into a browser.
///
/// Every call runs in its own session; the pipeline may call concurrently
/// for different browsers and bounds each call with a timeout.
#[async_trait]
pub trait BrowserAutomation: Send + Sync {
    fn name(&self) -> &str;

    /// Load the extension and report whether the browser accepted it
    async fn load_extension(&self, request: &LaunchRequest) -> anyhow::Result<AutomationOutcome>;

    /// Exercise the loaded extension (popup, content scripts, background).
    /// Defaults to a plain load.
    async fn exercise(&self, request: &LaunchRequest) -> anyhow::Result<AutomationOutcome> {
        self.load_extension(request).await
    }
}

/// Browser-free stand-in: "loads" when the manifest parses and carries the
/// fields every browser requires.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLoadCheck;

const REQUIRED_FIELDS: [&str; 3] = ["manifest_version", "name", "version"];

#[async_trait]
impl BrowserAutomation for StaticLoadCheck {
    fn name(&self) -> &str {
        "static"
    }

    async fn load_extension(&self, request: &LaunchRequest) -> anyhow::Result<AutomationOutcome> {
        let store = ManifestStore::new(&request.extension_path);
        let manifest = match store.load() {
            Ok(manifest) => manifest,
            Err(e) => return Ok(AutomationOutcome::failed(e.to_string())),
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !manifest.has_key(field))
            .collect();
        if !missing.is_empty() {
            return Ok(AutomationOutcome::failed(format!(
                "Missing required manifest fields: {}",
                missing.join(", ")
            )));
        }

        Ok(AutomationOutcome::loaded(request.extension_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_static_load_loads_minimal_manifest() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":3,"name":"T","version":"1.0"}"#,
        )
        .unwrap();

        let request = LaunchRequest::new(dir.path(), BrowserKind::Chrome, true)
            .with_extension_id(Some("abc".to_string()));
        let outcome = StaticLoadCheck.load_extension(&request).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.extension_loaded);
        assert_eq!(outcome.extension_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_static_load_reports_missing_fields() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("manifest.json"), r#"{"name":"T"}"#).unwrap();

        let request = LaunchRequest::new(dir.path(), BrowserKind::Firefox, true);
        let outcome = StaticLoadCheck.exercise(&request).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.errors,
            vec!["Missing required manifest fields: manifest_version, version"]
        );
    }

    #[tokio::test]
    async fn test_static_load_without_manifest() {
        let dir = tempdir().unwrap();
        let request = LaunchRequest::new(dir.path(), BrowserKind::Edge, false);
        let outcome = StaticLoadCheck.load_extension(&request).await.unwrap();
        assert!(!outcome.extension_loaded);
        assert_eq!(outcome.errors, vec!["manifest.json not found in extension root"]);
    }
}
