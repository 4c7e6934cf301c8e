use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::fqn;
use crate::ids::AssetId;
use crate::value::PropertyMap;

/// The closed set of asset kinds an operator can define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Folder,
    Environment,
    Node,
    Package,
    PackageOption,
}

impl AssetType {
    pub const ALL: [AssetType; 5] = [
        AssetType::Folder,
        AssetType::Environment,
        AssetType::Node,
        AssetType::Package,
        AssetType::PackageOption,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Environment => "environment",
            Self::Node => "node",
            Self::Package => "package",
            Self::PackageOption => "package_option",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Serialization(format!("unknown asset type: {s}")))
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing form of an asset: identity, placement and template link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub fqn: String,
    pub asset_type: AssetType,
    pub asset_key: String,
    pub template_fqn: Option<String>,
}

/// A full asset record as stored: the listing fields plus local overrides.
///
/// Records are never edited in place once they sit in an overlay; callers
/// build a modified copy and replace the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmergedAsset {
    pub id: AssetId,
    pub fqn: String,
    pub asset_type: AssetType,
    pub asset_key: String,
    pub template_fqn: Option<String>,
    #[serde(default)]
    pub overrides: PropertyMap,
}

impl UnmergedAsset {
    pub fn new(
        id: AssetId,
        fqn: &str,
        asset_type: AssetType,
        template_fqn: Option<&str>,
        overrides: PropertyMap,
    ) -> Result<Self, CoreError> {
        fqn::validate(fqn)?;
        Ok(Self {
            id,
            fqn: fqn.to_string(),
            asset_type,
            asset_key: fqn::key(fqn).to_string(),
            template_fqn: template_fqn.map(str::to_string),
            overrides,
        })
    }

    /// Check that `asset_key` is the last segment of `fqn`.
    pub fn check_key(&self) -> Result<(), CoreError> {
        if fqn::key(&self.fqn) != self.asset_key {
            return Err(CoreError::KeyMismatch {
                fqn: self.fqn.clone(),
                key: self.asset_key.clone(),
            });
        }
        Ok(())
    }

    pub fn parent_fqn(&self) -> Option<&str> {
        fqn::parent(&self.fqn)
    }

    /// Copy of this record relocated to `new_fqn`, with the key kept in sync.
    pub fn with_fqn(&self, new_fqn: &str) -> Self {
        Self {
            fqn: new_fqn.to_string(),
            asset_key: fqn::key(new_fqn).to_string(),
            ..self.clone()
        }
    }

    pub fn with_template(&self, template_fqn: Option<&str>) -> Self {
        Self {
            template_fqn: template_fqn.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn with_overrides(&self, overrides: PropertyMap) -> Self {
        Self {
            overrides,
            ..self.clone()
        }
    }

    pub fn summary(&self) -> Asset {
        Asset {
            id: self.id,
            fqn: self.fqn.clone(),
            asset_type: self.asset_type,
            asset_key: self.asset_key.clone(),
            template_fqn: self.template_fqn.clone(),
        }
    }
}

/// The fully resolved view of an asset after walking its template chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedAsset {
    pub properties: PropertyMap,
    /// Ancestor fqns, root-most first. The asset itself is not included.
    pub inheritance_chain: Vec<String>,
    /// Dot-path of every leaf to the fqn that supplied its value.
    pub property_sources: BTreeMap<String, String>,
}
