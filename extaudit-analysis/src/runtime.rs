//! Runtime behaviour checks run alongside each stage-5 automation session

use extaudit_core::constants::is_blocking_host_pattern;
use extaudit_core::{Finding, FindingCategory, ManifestDocument};
use extaudit_utils::safe_path_join;
use serde::Serialize;
use std::path::Path;

/// Permissions that draw extra store scrutiny at runtime
pub const RUNTIME_DANGEROUS_PERMISSIONS: [(&str, &str); 4] = [
    ("webRequestBlocking", "High impact permission"),
    ("proxy", "Rare use, many stores reject"),
    ("debugger", "Cannot be used in store extensions"),
    ("declarativeNetRequest", "Requires additional review"),
];

/// One named check and what it found
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeCheck {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
    pub findings: Vec<Finding>,
}

impl RuntimeCheck {
    fn evaluate(name: &'static str, findings: Vec<Finding>, ok_message: String) -> Self {
        let passed = !findings.iter().any(Finding::is_error);
        let message = if passed {
            ok_message
        } else {
            format!("{name} check failed")
        };
        Self {
            name,
            passed,
            message,
            findings,
        }
    }
}

fn exists(root: &Path, relative: &str) -> bool {
    safe_path_join(root, Path::new(relative)).map_or(false, |path| path.is_file())
}

fn error(code: &str, message: String) -> Finding {
    Finding::error(FindingCategory::Runtime, code, message)
}

fn warning(code: &str, message: String) -> Finding {
    Finding::warning(FindingCategory::Runtime, code, message)
}

pub fn check_popup(root: &Path, manifest: &ManifestDocument) -> RuntimeCheck {
    let Some(popup) = manifest.popup_file() else {
        return RuntimeCheck::evaluate("popup", Vec::new(), "No popup configured".to_string());
    };

    let mut findings = Vec::new();
    if exists(root, popup) {
        let html = safe_path_join(root, Path::new(popup))
            .ok()
            .and_then(|path| extaudit_utils::file::read_text_lossy(&path).ok())
            .unwrap_or_default();
        if html.to_lowercase().contains("<script>") {
            findings.push(error(
                "runtime-popup-inline-script",
                "Popup contains inline script (will be rejected from store)".to_string(),
            ));
            findings.push(warning(
                "runtime-popup-inline-script",
                "Move inline scripts to external .js file".to_string(),
            ));
        }
    } else {
        findings.push(error(
            "runtime-popup-missing",
            format!("Popup file not found: {popup}"),
        ));
    }

    RuntimeCheck::evaluate("popup", findings, format!("Popup test passed: {popup}"))
}

pub fn check_content_scripts(root: &Path, manifest: &ManifestDocument) -> RuntimeCheck {
    let mut findings = Vec::new();
    for (index, script) in manifest.content_scripts.iter().enumerate() {
        for js in &script.js {
            if !exists(root, js) {
                findings.push(error(
                    "runtime-content-script-missing",
                    format!("Content script not found: {js}"),
                ));
            }
        }
        if script.matches.is_empty() {
            findings.push(error(
                "runtime-content-script-no-matches",
                format!("Content script {index}: no match patterns"),
            ));
        }
        for pattern in script.matches.iter().filter(|m| is_blocking_host_pattern(m)) {
            findings.push(warning(
                "runtime-content-script-broad-match",
                format!("Overly broad match pattern: {pattern}"),
            ));
        }
    }

    let ok = if manifest.content_scripts.is_empty() {
        "No content scripts (not required)".to_string()
    } else {
        format!("Content scripts valid ({} scripts)", manifest.content_scripts.len())
    };
    RuntimeCheck::evaluate("content_scripts", findings, ok)
}

pub fn check_background(root: &Path, manifest: &ManifestDocument) -> RuntimeCheck {
    let mut findings = Vec::new();
    let Some(background) = manifest.background.as_ref().filter(|b| !b.is_empty()) else {
        return RuntimeCheck::evaluate("background", findings, "No background declared".to_string());
    };

    if manifest.is_mv3() {
        match &background.service_worker {
            Some(worker) if !exists(root, worker) => findings.push(error(
                "runtime-service-worker-missing",
                format!("Service worker file not found: {worker}"),
            )),
            Some(_) => {}
            None => findings.push(error(
                "runtime-service-worker-missing",
                "MV3: Missing service_worker in background".to_string(),
            )),
        }
    } else {
        if let Some(page) = background.page.as_deref().filter(|p| !exists(root, p)) {
            findings.push(error(
                "runtime-background-page-missing",
                format!("Background page not found: {page}"),
            ));
        }
        for script in background.scripts.iter().filter(|s| !exists(root, s)) {
            findings.push(error(
                "runtime-background-script-missing",
                format!("Background script not found: {script}"),
            ));
        }
    }

    let version = manifest.manifest_version.unwrap_or(2);
    RuntimeCheck::evaluate("background", findings, format!("Background script valid (MV{version})"))
}

pub fn check_permissions(manifest: &ManifestDocument) -> RuntimeCheck {
    let mut findings: Vec<Finding> = manifest
        .permissions
        .iter()
        .filter_map(|perm| {
            RUNTIME_DANGEROUS_PERMISSIONS
                .iter()
                .find(|(name, _)| *name == perm.as_str())
                .map(|(name, reason)| {
                    warning("runtime-dangerous-permission", format!("{name}: {reason}"))
                })
        })
        .collect();
    findings.extend(
        manifest
            .host_permissions
            .iter()
            .filter(|host| is_blocking_host_pattern(host))
            .map(|host| warning("runtime-broad-host", format!("{host}: Overly broad permission"))),
    );

    RuntimeCheck::evaluate(
        "permissions",
        findings,
        format!(
            "Permissions valid ({} API + {} host)",
            manifest.permissions.len(),
            manifest.host_permissions.len()
        ),
    )
}

/// All runtime checks in a fixed order
pub fn run_runtime_checks(root: &Path, manifest: &ManifestDocument) -> Vec<RuntimeCheck> {
    vec![
        check_popup(root, manifest),
        check_content_scripts(root, manifest),
        check_background(root, manifest),
        check_permissions(manifest),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn manifest(json: &str) -> ManifestDocument {
        json.parse().unwrap()
    }

    #[test]
    fn test_minimal_extension_passes_everything() {
        let dir = tempdir().unwrap();
        let doc = manifest(r#"{"manifest_version":3,"name":"T","version":"1.0"}"#);
        let checks = run_runtime_checks(dir.path(), &doc);
        assert_eq!(checks.len(), 4);
        assert!(checks.iter().all(|c| c.passed && c.findings.is_empty()));
        assert_eq!(checks[1].message, "No content scripts (not required)");
    }

    #[test]
    fn test_popup_inline_script_and_missing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("popup.html"), "<html><SCRIPT>alert(1)</SCRIPT></html>").unwrap();

        let doc = manifest(
            r#"{"manifest_version":3,"name":"T","version":"1","action":{"default_popup":"popup.html"}}"#,
        );
        let popup = check_popup(dir.path(), &doc);
        assert!(!popup.passed);
        assert_eq!(popup.findings.len(), 2);

        let doc = manifest(
            r#"{"manifest_version":2,"name":"T","version":"1","browser_action":{"default_popup":"gone.html"}}"#,
        );
        let popup = check_popup(dir.path(), &doc);
        assert_eq!(popup.findings[0].message, "Popup file not found: gone.html");
    }

    #[test]
    fn test_content_scripts_and_background() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("content.js"), "").unwrap();

        let doc = manifest(
            r#"{"manifest_version":3,"name":"T","version":"1",
                "content_scripts":[{"js":["content.js","missing.js"],"matches":["<all_urls>"]},{"js":[]}],
                "background":{"service_worker":"sw.js"}}"#,
        );
        let scripts = check_content_scripts(dir.path(), &doc);
        let messages: Vec<&str> = scripts.findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Content script not found: missing.js",
                "Overly broad match pattern: <all_urls>",
                "Content script 1: no match patterns",
            ]
        );

        let background = check_background(dir.path(), &doc);
        assert!(!background.passed);
        assert_eq!(background.findings[0].message, "Service worker file not found: sw.js");
    }

    #[test]
    fn test_dangerous_permissions_are_advisory() {
        let doc = manifest(
            r#"{"manifest_version":3,"name":"T","version":"1",
                "permissions":["debugger","storage"],"host_permissions":["*://*/*"]}"#,
        );
        let check = check_permissions(&doc);
        assert!(check.passed);
        assert_eq!(check.findings.len(), 2);
        assert!(check.findings.iter().all(Finding::is_warning));
    }
}
