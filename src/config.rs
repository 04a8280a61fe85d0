//! Validated configuration shapes for the manager and each plugin entry.
//!
//! Grounded on `examples/original_source/src/plume/PluginConfig.h` and
//! `ManagerConfig.h`. Deserialization uses `serde`/`serde_json` as the
//! common intermediate; `toml`/`serde_yaml` loaders funnel through it so
//! validation lives in exactly one place (SPEC_FULL.md §11).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parameter::ParameterDescriptor;

/// A group is one inner list of the `parameters` array: an alternative set
/// of parameter descriptors (see Negotiator §4.4).
pub type ParameterGroup = Vec<ParameterDescriptor>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    pub name: String,
    pub lib: String,
    #[serde(default)]
    pub parameters: Vec<ParameterGroup>,
    #[serde(default, rename = "core-config")]
    pub core_config: Option<serde_json::Value>,
}

impl PluginConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lib(&self) -> &str {
        &self.lib
    }

    pub fn parameters(&self) -> &[ParameterGroup] {
        &self.parameters
    }

    pub fn core_config(&self) -> serde_json::Value {
        self.core_config.clone().unwrap_or(serde_json::Value::Null)
    }

    /// Groups reduced to plain name lists, as the negotiator consumes them.
    pub fn group_names(&self) -> Vec<Vec<String>> {
        self.parameters
            .iter()
            .map(|g| g.iter().map(|d| d.name.clone()).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    pub plugins: Vec<PluginConfig>,
    #[serde(default)]
    pub verbose: bool,
}

impl ManagerConfig {
    pub fn plugins(&self) -> &[PluginConfig] {
        &self.plugins
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::bad_value(format!("invalid manager config: {e}")))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(s).map_err(|e| Error::bad_value(format!("invalid JSON: {e}")))?;
        Self::from_json_value(value)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(s).map_err(|e| Error::bad_value(format!("invalid TOML: {e}")))?;
        let json = serde_json::to_value(value).map_err(|e| Error::bad_value(e.to_string()))?;
        Self::from_json_value(json)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(s).map_err(|e| Error::bad_value(format!("invalid YAML: {e}")))?;
        let json = serde_json::to_value(value).map_err(|e| Error::bad_value(e.to_string()))?;
        Self::from_json_value(json)
    }

    /// Loads from disk, sniffing the format from the file extension (`.toml`,
    /// `.yml`/`.yaml`, else JSON).
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::bad_value(format!("cannot read {}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("yml") | Some("yaml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_config() {
        let toml = r#"
            [[plugins]]
            name = "SimplePlugin"
            lib = "simple_plugin"
        "#;
        let cfg = ManagerConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.plugins().len(), 1);
        assert_eq!(cfg.plugins()[0].name(), "SimplePlugin");
        assert!(!cfg.verbose());
    }

    #[test]
    fn parses_yaml_with_groups() {
        let yaml = r#"
plugins:
  - name: GroupedPlugin
    lib: grouped_plugin
    parameters:
      - - name: I
          type: INT
        - name: J
          type: INT
      - - name: XYZ
          type: INT
"#;
        let cfg = ManagerConfig::from_yaml_str(yaml).unwrap();
        let groups = cfg.plugins()[0].group_names();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec!["I".to_string(), "J".to_string()]);
    }

    #[test]
    fn unknown_top_level_key_is_bad_value() {
        let toml = r#"
            plugins = []
            bogus = true
        "#;
        assert!(ManagerConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn missing_essential_key_is_bad_value() {
        let toml = r#"
            [[plugins]]
            name = "SimplePlugin"
        "#;
        assert!(ManagerConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn core_config_key_is_hyphenated_on_the_wire() {
        let toml = r#"
            [[plugins]]
            name = "SimplePlugin"
            lib = "simple_plugin"
            [plugins.core-config]
            threshold = 3
        "#;
        let cfg = ManagerConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.plugins()[0].core_config()["threshold"], serde_json::json!(3));
    }
}
