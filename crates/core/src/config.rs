//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! undo_depth = 200
//!
//! [asset_types.package]
//! shareable = true
//! initial_overrides = { version = "latest" }
//!
//! [[placement]]
//! parent = "*"
//! child = "environment"
//! allow = false
//! reason = "environments live at the top level"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::CoreError;
use crate::value::PropertyMap;

pub const DEFAULT_UNDO_DEPTH: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum retained undo entries; the oldest are dropped first. Must be
    /// at least 1.
    #[serde(default = "default_undo_depth")]
    pub undo_depth: usize,

    /// Per-type metadata keyed by asset type name (`"node"`, `"package"`, ...).
    #[serde(default)]
    pub asset_types: BTreeMap<String, AssetTypeConfig>,

    /// Placement rules, applied on top of the built-in defaults.
    #[serde(default)]
    pub placement: Vec<PlacementRuleConfig>,
}

fn default_undo_depth() -> usize {
    DEFAULT_UNDO_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_depth: default_undo_depth(),
            asset_types: BTreeMap::new(),
            placement: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetTypeConfig {
    #[serde(default)]
    pub label: Option<String>,

    /// Assets of this type may stay referenced as templates across a clone
    /// boundary.
    #[serde(default)]
    pub shareable: Option<bool>,

    /// Overrides seeded into every newly created asset of this type.
    #[serde(default)]
    pub initial_overrides: PropertyMap,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacementRuleConfig {
    /// Asset type name or `"*"`.
    pub parent: String,
    /// Asset type name or `"*"`.
    pub child: String,
    #[serde(default = "default_allow")]
    pub allow: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_allow() -> bool {
    true
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, CoreError> {
        toml::from_str(source).map_err(|e| CoreError::InvalidConfig(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| CoreError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        debug!(
            path = %path.display(),
            asset_types = config.asset_types.len(),
            placement_rules = config.placement.len(),
            "engine config loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyValue;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.undo_depth, DEFAULT_UNDO_DEPTH);
        assert!(config.asset_types.is_empty());
        assert!(config.placement.is_empty());
    }

    #[test]
    fn parses_types_and_rules() {
        let config = EngineConfig::from_toml_str(
            r#"
            undo_depth = 7

            [asset_types.node]
            label = "Server"
            initial_overrides = { cpu = 2, tags = ["base"], net = { mtu = 1500 } }

            [[placement]]
            parent = "node"
            child = "*"
            allow = false
            reason = "nodes are leaves"
            "#,
        )
        .unwrap();
        assert_eq!(config.undo_depth, 7);
        let node = &config.asset_types["node"];
        assert_eq!(node.label.as_deref(), Some("Server"));
        assert_eq!(node.initial_overrides.get("cpu"), Some(&PropertyValue::Integer(2)));
        assert_eq!(
            node.initial_overrides.get("tags"),
            Some(&PropertyValue::from(vec!["base"]))
        );
        assert!(matches!(node.initial_overrides.get("net"), Some(PropertyValue::Map(_))));
        assert_eq!(config.placement.len(), 1);
        assert!(!config.placement[0].allow);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("undo_depth = \"many\""),
            Err(CoreError::InvalidConfig(_))
        ));
    }
}
