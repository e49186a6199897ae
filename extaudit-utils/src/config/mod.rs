//! Configuration loading and layering
//!
//! Config records are plain serde structs. They can be read from TOML, JSON
//! or YAML (picked by file extension) and layered with a deep JSON merge, so a
//! file only needs to mention the keys it wants to override.

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Supported on-disk formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick a format from the file extension
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yml" | "yaml" => Ok(Self::Yaml),
            _ => Err(crate::UtilError::Config(format!(
                "Unsupported config format: '{extension}'"
            ))),
        }
    }
}

/// Parse config text into an untyped JSON value
pub fn parse_value(content: &str, format: ConfigFormat) -> crate::Result<serde_json::Value> {
    match format {
        ConfigFormat::Toml => {
            let toml_value: toml::Value = toml::from_str(content)
                .map_err(|e| crate::UtilError::Config(format!("TOML parse error: {e}")))?;
            serde_json::to_value(toml_value)
                .map_err(|e| crate::UtilError::Config(format!("TOML conversion error: {e}")))
        }
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| crate::UtilError::Config(format!("JSON parse error: {e}"))),
        ConfigFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| crate::UtilError::Config(format!("YAML parse error: {e}"))),
    }
}

/// Read a config file into an untyped JSON value
pub fn load_value(path: &Path) -> crate::Result<serde_json::Value> {
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_value(&content, format)
}

/// Load a typed configuration record from a file
pub fn load_config<T>(path: &Path) -> crate::Result<T>
where
    T: DeserializeOwned,
{
    let value = load_value(path)?;
    serde_json::from_value(value).map_err(|e| {
        crate::UtilError::Config(format!("{}: {e}", path.display()))
    })
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else
/// is replaced.
pub fn merge_json_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, value) in overlay_obj {
                match base_obj.get_mut(&key) {
                    Some(existing) => merge_json_values(existing, value),
                    None => {
                        base_obj.insert(key, value);
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

/// Merge two configurations (second overrides first)
pub fn merge_configs<T>(base: &mut T, override_config: T) -> crate::Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let value = serde_json::to_value(override_config)
        .map_err(|e| crate::UtilError::Serialization(format!("Override serialization error: {e}")))?;
    merge_value_into(base, value)
}

/// Overlay an untyped value onto a typed config
fn merge_value_into<T>(base: &mut T, overlay: serde_json::Value) -> crate::Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let mut base_value = serde_json::to_value(&*base)
        .map_err(|e| crate::UtilError::Serialization(format!("Base serialization error: {e}")))?;

    merge_json_values(&mut base_value, overlay);

    *base = serde_json::from_value(base_value)
        .map_err(|e| crate::UtilError::Serialization(format!("Result deserialization error: {e}")))?;

    Ok(())
}

/// Fluent layering: defaults, then files, then programmatic overrides
#[derive(Debug)]
pub struct ConfigBuilder<T> {
    config: T,
}

impl<T> ConfigBuilder<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            config: T::default(),
        }
    }

    /// Overlay only the keys present in the file
    pub fn load_file(mut self, path: &Path) -> crate::Result<Self> {
        let overlay = load_value(path)?;
        merge_value_into(&mut self.config, overlay)?;
        Ok(self)
    }

    /// Overlay a complete record
    pub fn merge(mut self, other: T) -> crate::Result<Self> {
        merge_configs(&mut self.config, other)?;
        Ok(self)
    }

    /// Overlay an untyped fragment, e.g. `{"timeout_secs": 5}`
    pub fn merge_value(mut self, overlay: serde_json::Value) -> crate::Result<Self> {
        merge_value_into(&mut self.config, overlay)?;
        Ok(self)
    }

    pub fn build(self) -> T {
        self.config
    }
}

impl<T> Default for ConfigBuilder<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct TestConfig {
        name: String,
        port: u16,
        enabled: bool,
        nested: Nested,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    #[serde(default)]
    struct Nested {
        threshold: u32,
        tags: Vec<String>,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                port: 8080,
                enabled: true,
                nested: Nested {
                    threshold: 10,
                    tags: vec!["a".to_string()],
                },
            }
        }
    }

    #[test]
    fn test_load_toml() -> crate::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("audit.toml");
        std::fs::write(
            &path,
            "name = \"from-toml\"\nport = 9000\nenabled = false\n[nested]\nthreshold = 3\n",
        )?;

        let config: TestConfig = load_config(&path)?;
        assert_eq!(config.name, "from-toml");
        assert_eq!(config.port, 9000);
        assert!(!config.enabled);
        assert_eq!(config.nested.threshold, 3);
        // Missing keys fall back to serde defaults
        assert_eq!(config.nested.tags, vec!["a"]);

        Ok(())
    }

    #[test]
    fn test_partial_file_only_overrides_named_keys() -> crate::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("override.yaml");
        std::fs::write(&path, "nested:\n  threshold: 42\n")?;

        let config: TestConfig = ConfigBuilder::new()
            .merge_value(serde_json::json!({"name": "layered"}))?
            .load_file(&path)?
            .build();

        assert_eq!(config.name, "layered");
        assert_eq!(config.port, 8080);
        assert_eq!(config.nested.threshold, 42);
        assert_eq!(config.nested.tags, vec!["a"]);

        Ok(())
    }

    #[test]
    fn test_merge_configs_replaces_values() -> crate::Result<()> {
        let mut base = TestConfig::default();
        let other = TestConfig {
            name: "other".to_string(),
            port: 1,
            enabled: false,
            nested: Nested {
                threshold: 0,
                tags: vec!["x".to_string(), "y".to_string()],
            },
        };

        merge_configs(&mut base, other)?;
        assert_eq!(base.name, "other");
        assert_eq!(base.nested.tags, vec!["x", "y"]);

        Ok(())
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigFormat::from_path(Path::new("audit.ini")).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = parse_value("{not json", ConfigFormat::Json).unwrap_err();
        assert!(matches!(err, crate::UtilError::Config(_)));
    }
}
