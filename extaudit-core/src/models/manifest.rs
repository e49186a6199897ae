//! Typed view of an extension manifest
//!
//! The typed fields are lenient: a key with the wrong JSON type shows up as
//! absent (or empty) here, while [`ManifestDocument::raw`] keeps the document
//! exactly as written so the rule engine can still report the type error.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One `content_scripts` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContentScript {
    pub js: Vec<String>,
    pub css: Vec<String>,
    pub matches: Vec<String>,
    pub run_at: Option<String>,
}

/// The `background` object. Any combination of keys may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Background {
    pub service_worker: Option<String>,
    pub scripts: Vec<String>,
    pub page: Option<String>,
}

impl Background {
    /// True for `"background": {}` or an object with none of the known keys
    pub fn is_empty(&self) -> bool {
        self.service_worker.is_none() && self.scripts.is_empty() && self.page.is_none()
    }
}

/// `action` / `browser_action` / `page_action`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionConfig {
    pub default_popup: Option<String>,
    pub default_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExternallyConnectable {
    pub matches: Vec<String>,
    pub ids: Vec<String>,
}

/// Parsed manifest. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestDocument {
    pub manifest_version: Option<u64>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// size -> path
    pub icons: BTreeMap<String, String>,
    /// Declaration order, duplicates removed
    pub permissions: Vec<String>,
    pub host_permissions: Vec<String>,
    pub content_scripts: Vec<ContentScript>,
    pub background: Option<Background>,
    pub action: Option<ActionConfig>,
    pub browser_action: Option<ActionConfig>,
    pub page_action: Option<ActionConfig>,
    /// MV3 object policies are flattened to one string
    pub content_security_policy: Option<String>,
    pub options_page: Option<String>,
    pub options_ui_page: Option<String>,
    pub externally_connectable: Option<ExternallyConnectable>,
    pub has_browser_specific_settings: bool,
    pub homepage_url: Option<String>,
    pub privacy_policy_url: Option<String>,
    pub author: Option<String>,
    pub developer: Option<String>,
    pub has_web_accessible_resources: bool,
    #[serde(skip)]
    raw: Value,
}

impl ManifestDocument {
    /// Build the typed view. Fails only when the document is not an object.
    pub fn from_value(raw: Value) -> Result<Self, crate::ManifestError> {
        let obj = raw.as_object().ok_or(crate::ManifestError::NotAnObject)?;

        let document = Self {
            manifest_version: obj.get("manifest_version").and_then(Value::as_u64),
            name: string_field(obj, "name"),
            version: string_field(obj, "version"),
            description: string_field(obj, "description"),
            icons: obj
                .get("icons")
                .and_then(Value::as_object)
                .map(|icons| {
                    icons
                        .iter()
                        .filter_map(|(size, path)| Some((size.clone(), path.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default(),
            permissions: dedup(string_list(obj.get("permissions"))),
            host_permissions: dedup(string_list(obj.get("host_permissions"))),
            content_scripts: obj
                .get("content_scripts")
                .and_then(Value::as_array)
                .map(|entries| entries.iter().filter_map(parse_content_script).collect())
                .unwrap_or_default(),
            background: obj.get("background").and_then(Value::as_object).map(|bg| Background {
                service_worker: string_field(bg, "service_worker"),
                scripts: string_list(bg.get("scripts")),
                page: string_field(bg, "page"),
            }),
            action: obj.get("action").and_then(parse_action),
            browser_action: obj.get("browser_action").and_then(parse_action),
            page_action: obj.get("page_action").and_then(parse_action),
            content_security_policy: obj.get("content_security_policy").and_then(flatten_csp),
            options_page: string_field(obj, "options_page"),
            options_ui_page: obj
                .get("options_ui")
                .and_then(Value::as_object)
                .and_then(|ui| string_field(ui, "page")),
            externally_connectable: obj
                .get("externally_connectable")
                .and_then(Value::as_object)
                .map(|ec| ExternallyConnectable {
                    matches: string_list(ec.get("matches")),
                    ids: string_list(ec.get("ids")),
                }),
            has_browser_specific_settings: obj.contains_key("browser_specific_settings")
                || obj.contains_key("applications"),
            homepage_url: string_field(obj, "homepage_url"),
            privacy_policy_url: string_field(obj, "privacy_policy_url"),
            author: person_field(obj.get("author")),
            developer: person_field(obj.get("developer")),
            has_web_accessible_resources: obj.contains_key("web_accessible_resources"),
            raw: raw.clone(),
        };

        Ok(document)
    }

    /// The document exactly as parsed
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Top-level object of the raw document
    pub fn raw_object(&self) -> Option<&Map<String, Value>> {
        self.raw.as_object()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.raw_object().map_or(false, |obj| obj.contains_key(key))
    }

    pub fn is_mv3(&self) -> bool {
        self.manifest_version == Some(3)
    }

    pub fn is_mv2(&self) -> bool {
        self.manifest_version == Some(2)
    }

    /// Case-insensitive search across the whole serialized document
    pub fn mentions(&self, needle: &str) -> bool {
        self.raw
            .to_string()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    /// The action that owns the popup for this manifest version
    pub fn popup_action(&self) -> Option<&ActionConfig> {
        if self.is_mv3() {
            self.action.as_ref()
        } else {
            self.browser_action.as_ref().or(self.page_action.as_ref())
        }
    }

    pub fn popup_file(&self) -> Option<&str> {
        self.popup_action()?.default_popup.as_deref()
    }

    pub fn options_file(&self) -> Option<&str> {
        self.options_page.as_deref().or(self.options_ui_page.as_deref())
    }
}

impl std::str::FromStr for ManifestDocument {
    type Err = crate::ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: Value = serde_json::from_str(s).map_err(crate::ManifestError::InvalidJson)?;
        Self::from_value(raw)
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

fn parse_content_script(entry: &Value) -> Option<ContentScript> {
    let entry = entry.as_object()?;
    Some(ContentScript {
        js: string_list(entry.get("js")),
        css: string_list(entry.get("css")),
        matches: string_list(entry.get("matches")),
        run_at: string_field(entry, "run_at"),
    })
}

fn parse_action(value: &Value) -> Option<ActionConfig> {
    let action = value.as_object()?;
    Some(ActionConfig {
        default_popup: string_field(action, "default_popup"),
        default_title: string_field(action, "default_title"),
    })
}

fn flatten_csp(value: &Value) -> Option<String> {
    match value {
        Value::String(policy) => Some(policy.clone()),
        // MV3: {"extension_pages": "...", "sandbox": "..."}
        Value::Object(policies) => Some(
            policies
                .iter()
                .filter_map(|(key, policy)| Some(format!("{key}: {}", policy.as_str()?)))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

/// `author` may be a string or `{"email": ...}`; `developer` is `{"name", "url"}`
fn person_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => {
            let parts: Vec<&str> = ["name", "url", "email"]
                .iter()
                .filter_map(|key| obj.get(*key).and_then(Value::as_str))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}
