//! Shared engine context: asset-type metadata and placement rules.
//!
//! Built once from an [`EngineConfig`] and handed to every component that
//! needs it.

use std::collections::{BTreeMap, HashMap};

use crate::asset::AssetType;
use crate::config::{DEFAULT_UNDO_DEPTH, EngineConfig};
use crate::error::CoreError;
use crate::value::PropertyMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTypeInfo {
    pub label: String,
    pub shareable: bool,
    pub initial_overrides: PropertyMap,
}

impl AssetTypeInfo {
    fn builtin(asset_type: AssetType) -> Self {
        let (label, shareable) = match asset_type {
            AssetType::Folder => ("Folder", false),
            AssetType::Environment => ("Environment", false),
            AssetType::Node => ("Node", false),
            AssetType::Package => ("Package", true),
            AssetType::PackageOption => ("Option", true),
        };
        Self {
            label: label.to_string(),
            shareable,
            initial_overrides: PropertyMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetTypeRegistry {
    types: BTreeMap<AssetType, AssetTypeInfo>,
}

impl Default for AssetTypeRegistry {
    fn default() -> Self {
        Self {
            types: AssetType::ALL
                .into_iter()
                .map(|t| (t, AssetTypeInfo::builtin(t)))
                .collect(),
        }
    }
}

impl AssetTypeRegistry {
    pub fn info(&self, asset_type: AssetType) -> AssetTypeInfo {
        self.types
            .get(&asset_type)
            .cloned()
            .unwrap_or_else(|| AssetTypeInfo::builtin(asset_type))
    }

    pub fn is_shareable(&self, asset_type: AssetType) -> bool {
        self.types
            .get(&asset_type)
            .is_some_and(|info| info.shareable)
    }

    pub fn initial_overrides(&self, asset_type: AssetType) -> PropertyMap {
        self.types
            .get(&asset_type)
            .map(|info| info.initial_overrides.clone())
            .unwrap_or_default()
    }

    pub fn set(&mut self, asset_type: AssetType, info: AssetTypeInfo) {
        self.types.insert(asset_type, info);
    }

    /// Display name for one side of a placement rule.
    pub fn describe(&self, selector: TypeSelector) -> String {
        match selector {
            TypeSelector::Exact(asset_type) => self.info(asset_type).label,
            TypeSelector::Any => "any asset".to_string(),
        }
    }
}

/// One side of a placement rule key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSelector {
    Exact(AssetType),
    Any,
}

impl TypeSelector {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s == "*" {
            return Ok(Self::Any);
        }
        AssetType::parse(s)
            .map(Self::Exact)
            .map_err(|_| CoreError::InvalidConfig(format!("unknown asset type in rule: {s}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Allowed,
    Denied { reason: String },
}

impl Placement {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Placement::Allowed)
    }
}

/// Which asset types may be placed under which parents.
///
/// Lookup prefers the most specific key: the exact pair, then an exact parent
/// with any child, then any parent with an exact child, then the full
/// wildcard. With no match at all placement is allowed.
#[derive(Debug, Clone)]
pub struct PlacementRules {
    rules: HashMap<(TypeSelector, TypeSelector), Placement>,
}

impl Default for PlacementRules {
    fn default() -> Self {
        let mut rules = Self::empty();
        rules.set(
            TypeSelector::Any,
            TypeSelector::Exact(AssetType::PackageOption),
            Placement::Denied {
                reason: "options belong to a package".into(),
            },
        );
        rules.set(
            TypeSelector::Exact(AssetType::Package),
            TypeSelector::Exact(AssetType::PackageOption),
            Placement::Allowed,
        );
        rules.set(
            TypeSelector::Exact(AssetType::PackageOption),
            TypeSelector::Any,
            Placement::Denied {
                reason: "options cannot contain other assets".into(),
            },
        );
        rules
    }
}

impl PlacementRules {
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn set(&mut self, parent: TypeSelector, child: TypeSelector, placement: Placement) {
        self.rules.insert((parent, child), placement);
    }

    pub fn check(&self, parent: AssetType, child: AssetType) -> Placement {
        let candidates = [
            (TypeSelector::Exact(parent), TypeSelector::Exact(child)),
            (TypeSelector::Exact(parent), TypeSelector::Any),
            (TypeSelector::Any, TypeSelector::Exact(child)),
            (TypeSelector::Any, TypeSelector::Any),
        ];
        candidates
            .iter()
            .find_map(|key| self.rules.get(key))
            .cloned()
            .unwrap_or(Placement::Allowed)
    }
}

#[derive(Debug, Clone)]
pub struct EngineContext {
    pub undo_depth: usize,
    pub types: AssetTypeRegistry,
    pub placement: PlacementRules,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            undo_depth: DEFAULT_UNDO_DEPTH,
            types: AssetTypeRegistry::default(),
            placement: PlacementRules::default(),
        }
    }
}

impl EngineContext {
    pub fn from_config(config: &EngineConfig) -> Result<Self, CoreError> {
        if config.undo_depth == 0 {
            return Err(CoreError::InvalidConfig("undo_depth must be at least 1".into()));
        }
        let mut context = Self {
            undo_depth: config.undo_depth,
            ..Self::default()
        };

        for (name, type_config) in &config.asset_types {
            let asset_type = AssetType::parse(name)
                .map_err(|_| CoreError::InvalidConfig(format!("unknown asset type: {name}")))?;
            let mut info = context.types.info(asset_type);
            if let Some(label) = &type_config.label {
                info.label = label.clone();
            }
            if let Some(shareable) = type_config.shareable {
                info.shareable = shareable;
            }
            info.initial_overrides = type_config.initial_overrides.clone();
            context.types.set(asset_type, info);
        }

        for rule in &config.placement {
            let parent = TypeSelector::parse(&rule.parent)?;
            let child = TypeSelector::parse(&rule.child)?;
            let placement = if rule.allow {
                Placement::Allowed
            } else {
                Placement::Denied {
                    reason: rule.reason.clone().unwrap_or_else(|| {
                        format!(
                            "{} cannot contain {}",
                            context.types.describe(parent),
                            context.types.describe(child)
                        )
                    }),
                }
            };
            context.placement.set(parent, child, placement);
        }

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyValue;

    #[test]
    fn specific_rule_beats_wildcard() {
        let rules = PlacementRules::default();
        assert!(rules.check(AssetType::Package, AssetType::PackageOption).is_allowed());
        assert!(!rules.check(AssetType::Node, AssetType::PackageOption).is_allowed());
        assert!(!rules.check(AssetType::PackageOption, AssetType::Node).is_allowed());
        assert!(rules.check(AssetType::Folder, AssetType::Node).is_allowed());
    }

    #[test]
    fn exact_parent_wildcard_child_precedes_wildcard_parent() {
        let mut rules = PlacementRules::empty();
        rules.set(
            TypeSelector::Any,
            TypeSelector::Exact(AssetType::Node),
            Placement::Allowed,
        );
        rules.set(
            TypeSelector::Exact(AssetType::Node),
            TypeSelector::Any,
            Placement::Denied { reason: "leaf".into() },
        );
        assert_eq!(
            rules.check(AssetType::Node, AssetType::Node),
            Placement::Denied { reason: "leaf".into() }
        );
        assert!(rules.check(AssetType::Folder, AssetType::Node).is_allowed());
    }

    #[test]
    fn full_wildcard_is_the_fallback() {
        let mut rules = PlacementRules::empty();
        rules.set(
            TypeSelector::Any,
            TypeSelector::Any,
            Placement::Denied { reason: "locked".into() },
        );
        assert!(!rules.check(AssetType::Folder, AssetType::Folder).is_allowed());
    }

    #[test]
    fn context_from_config_overlays_builtins() {
        let config = EngineConfig::from_toml_str(
            r#"
            undo_depth = 3

            [asset_types.node]
            shareable = true
            initial_overrides = { cpu = 1 }

            [[placement]]
            parent = "folder"
            child = "package_option"
            "#,
        )
        .unwrap();
        let context = EngineContext::from_config(&config).unwrap();
        assert_eq!(context.undo_depth, 3);
        assert!(context.types.is_shareable(AssetType::Node));
        assert!(context.types.is_shareable(AssetType::Package));
        assert!(!context.types.is_shareable(AssetType::Folder));
        assert_eq!(
            context.types.initial_overrides(AssetType::Node).get("cpu"),
            Some(&PropertyValue::Integer(1))
        );
        assert!(context.placement.check(AssetType::Folder, AssetType::PackageOption).is_allowed());
    }

    #[test]
    fn default_denial_reason_uses_type_labels() {
        let config = EngineConfig::from_toml_str(
            r#"
            [asset_types.node]
            label = "Server"

            [[placement]]
            parent = "node"
            child = "*"
            allow = false
            "#,
        )
        .unwrap();
        let context = EngineContext::from_config(&config).unwrap();
        assert_eq!(
            context.placement.check(AssetType::Node, AssetType::Folder),
            Placement::Denied { reason: "Server cannot contain any asset".into() }
        );
    }

    #[test]
    fn zero_undo_depth_is_rejected() {
        let config = EngineConfig::from_toml_str("undo_depth = 0").unwrap();
        assert!(matches!(
            EngineContext::from_config(&config),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_type_in_config_is_rejected() {
        let config = EngineConfig::from_toml_str("[asset_types.widget]\nshareable = true").unwrap();
        assert!(EngineContext::from_config(&config).is_err());
    }
}
