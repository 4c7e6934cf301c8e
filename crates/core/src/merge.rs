//! Template chain walking and override merging.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{MergedAsset, UnmergedAsset};
use crate::ids::AssetId;
use crate::index::AssetIndex;
use crate::value::{PropertyMap, PropertyValue, dotted, leaf_paths};

/// Why an asset could not be resolved. Returned as a value so that one broken
/// asset does not abort a view over many.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionError {
    #[error("asset not found: {id}")]
    AssetNotFound { id: AssetId },

    #[error("{fqn}: template {missing} not found")]
    MissingTemplate { fqn: String, missing: String },

    #[error("{fqn}: circular template dependency")]
    CircularDependency { fqn: String },
}

pub type MergeResult = Result<MergedAsset, ResolutionError>;

/// How a template chain walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEnd {
    /// Reached an asset without a template.
    Root,
    /// The named template does not exist in the index.
    MissingTemplate(String),
    /// The named fqn was already visited.
    Cycle(String),
}

/// Ancestors of an asset, nearest template first.
#[derive(Debug, Clone)]
pub struct InheritanceChain<'a> {
    pub ancestors: Vec<&'a UnmergedAsset>,
    pub end: ChainEnd,
}

impl InheritanceChain<'_> {
    pub fn is_complete(&self) -> bool {
        self.end == ChainEnd::Root
    }

    /// Ancestor fqns ordered root-most first.
    pub fn fqns_root_first(&self) -> Vec<String> {
        self.ancestors.iter().rev().map(|a| a.fqn.clone()).collect()
    }
}

/// Follow `template_fqn` links from `asset` until a root, a missing template
/// or a revisit. Never fails: the outcome is recorded in [`InheritanceChain::end`]
/// and the ancestors gathered so far are kept.
pub fn inheritance_chain<'a>(asset: &UnmergedAsset, index: &'a AssetIndex) -> InheritanceChain<'a> {
    let mut ancestors = Vec::new();
    let mut visited = BTreeSet::from([asset.fqn.clone()]);
    let mut next = asset.template_fqn.clone();

    while let Some(template_fqn) = next {
        if !visited.insert(template_fqn.clone()) {
            return InheritanceChain {
                ancestors,
                end: ChainEnd::Cycle(template_fqn),
            };
        }
        let Some(template) = index.by_fqn(&template_fqn) else {
            return InheritanceChain {
                ancestors,
                end: ChainEnd::MissingTemplate(template_fqn),
            };
        };
        ancestors.push(template);
        next = template.template_fqn.clone();
    }

    InheritanceChain {
        ancestors,
        end: ChainEnd::Root,
    }
}

/// Resolve the asset with `id` against `index`.
///
/// Pure: the same index and id always produce the same result.
pub fn resolve(index: &AssetIndex, id: AssetId) -> MergeResult {
    let asset = index
        .get(id)
        .ok_or(ResolutionError::AssetNotFound { id })?;
    resolve_asset(asset, index)
}

/// Resolve `asset` (which need not be part of `index`) against `index`.
pub fn resolve_asset(asset: &UnmergedAsset, index: &AssetIndex) -> MergeResult {
    let chain = inheritance_chain(asset, index);
    match chain.end {
        ChainEnd::Root => {}
        ChainEnd::MissingTemplate(missing) => {
            return Err(ResolutionError::MissingTemplate {
                fqn: asset.fqn.clone(),
                missing,
            });
        }
        ChainEnd::Cycle(_) => {
            return Err(ResolutionError::CircularDependency {
                fqn: asset.fqn.clone(),
            });
        }
    }

    let mut properties = PropertyMap::new();
    let mut property_sources = BTreeMap::new();
    let contributors = chain
        .ancestors
        .iter()
        .rev()
        .copied()
        .chain(std::iter::once(asset));
    for contributor in contributors {
        merge_with_sources(
            &mut properties,
            &contributor.overrides,
            &contributor.fqn,
            &mut Vec::new(),
            &mut property_sources,
        );
    }

    Ok(MergedAsset {
        properties,
        inheritance_chain: chain.fqns_root_first(),
        property_sources,
    })
}

/// Resolve every asset in `index`, keyed by id.
pub fn resolve_all(index: &AssetIndex) -> BTreeMap<AssetId, MergeResult> {
    index
        .iter()
        .map(|asset| (asset.id, resolve_asset(asset, index)))
        .collect()
}

fn merge_with_sources(
    base: &mut PropertyMap,
    overlay: &PropertyMap,
    source_fqn: &str,
    path: &mut Vec<String>,
    sources: &mut BTreeMap<String, String>,
) {
    for (key, incoming) in overlay {
        path.push(key.clone());
        match (base.get_mut(key), incoming) {
            (Some(PropertyValue::Map(existing)), PropertyValue::Map(nested)) => {
                // An empty map was a leaf until now.
                if !nested.is_empty() {
                    sources.remove(&dotted(path));
                }
                merge_with_sources(existing, nested, source_fqn, path, sources);
            }
            _ => {
                forget_sources(sources, path);
                for leaf in leaf_paths(path, incoming) {
                    sources.insert(dotted(&leaf), source_fqn.to_string());
                }
                base.insert(key.clone(), incoming.clone());
            }
        }
        path.pop();
    }
}

/// Drop provenance for `path` and everything beneath it.
fn forget_sources(sources: &mut BTreeMap<String, String>, path: &[String]) {
    let exact = dotted(path);
    let nested = format!("{exact}.");
    sources.retain(|key, _| key != &exact && !key.starts_with(&nested));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetType;
    use crate::value::{map_of, split_dotted};

    fn asset(fqn: &str, template: Option<&str>, overrides: PropertyMap) -> UnmergedAsset {
        UnmergedAsset::new(AssetId::new(), fqn, AssetType::Node, template, overrides).unwrap()
    }

    fn nested(entries: PropertyMap) -> PropertyValue {
        PropertyValue::Map(entries)
    }

    #[test]
    fn merges_root_first_and_tracks_sources() {
        let base = asset(
            "tpl::base",
            None,
            map_of([
                ("cpu", PropertyValue::from(2)),
                ("net", nested(map_of([("mtu", 1500), ("vlan", 1)]))),
            ]),
        );
        let mid = asset(
            "tpl::mid",
            Some("tpl::base"),
            map_of([("net", nested(map_of([("vlan", 20)])))]),
        );
        let leaf = asset("prod::web", Some("tpl::mid"), map_of([("cpu", 8)]));
        let leaf_id = leaf.id;
        let index = AssetIndex::from_assets([base, mid, leaf]);

        let merged = resolve(&index, leaf_id).unwrap();
        assert_eq!(merged.inheritance_chain, vec!["tpl::base", "tpl::mid"]);
        assert_eq!(merged.properties.get("cpu"), Some(&PropertyValue::Integer(8)));
        assert_eq!(
            crate::value::get_path(&merged.properties, &split_dotted("net.vlan")),
            Some(&PropertyValue::Integer(20))
        );
        assert_eq!(merged.property_sources.get("cpu").map(String::as_str), Some("prod::web"));
        assert_eq!(merged.property_sources.get("net.vlan").map(String::as_str), Some("tpl::mid"));
        assert_eq!(merged.property_sources.get("net.mtu").map(String::as_str), Some("tpl::base"));
    }

    #[test]
    fn scalar_override_of_subtree_drops_stale_sources() {
        let base = asset("base", None, map_of([("net", nested(map_of([("mtu", 1500)])))]));
        let leaf = asset("leaf", Some("base"), map_of([("net", "disabled")]));
        let leaf_id = leaf.id;
        let index = AssetIndex::from_assets([base, leaf]);

        let merged = resolve(&index, leaf_id).unwrap();
        assert_eq!(merged.properties.get("net"), Some(&PropertyValue::from("disabled")));
        assert_eq!(merged.property_sources.len(), 1);
        assert_eq!(merged.property_sources.get("net").map(String::as_str), Some("leaf"));
    }

    #[test]
    fn keys_added_under_an_empty_map_replace_its_source() {
        let base = asset("base", None, map_of([("net", nested(PropertyMap::new()))]));
        let leaf = asset("leaf", Some("base"), map_of([("net", nested(map_of([("mtu", 9000)])))]));
        let leaf_id = leaf.id;
        let index = AssetIndex::from_assets([base, leaf]);

        let merged = resolve(&index, leaf_id).unwrap();
        assert_eq!(merged.property_sources.len(), 1);
        assert_eq!(merged.property_sources.get("net.mtu").map(String::as_str), Some("leaf"));
    }

    #[test]
    fn missing_template_names_the_reference() {
        let orphan = asset("orphan", Some("nowhere"), PropertyMap::new());
        let id = orphan.id;
        let index = AssetIndex::from_assets([orphan]);
        assert_eq!(
            resolve(&index, id),
            Err(ResolutionError::MissingTemplate {
                fqn: "orphan".into(),
                missing: "nowhere".into()
            })
        );
    }

    #[test]
    fn two_cycle_is_detected_by_resolver_and_walker() {
        let a = asset("circA", Some("circB"), PropertyMap::new());
        let b = asset("circB", Some("circA"), PropertyMap::new());
        let a_id = a.id;
        let index = AssetIndex::from_assets([a.clone(), b]);

        assert_eq!(
            resolve(&index, a_id),
            Err(ResolutionError::CircularDependency { fqn: "circA".into() })
        );
        let chain = inheritance_chain(&a, &index);
        assert_eq!(chain.end, ChainEnd::Cycle("circA".into()));
        assert_eq!(chain.ancestors.len(), 1);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let a = asset("self", Some("self"), PropertyMap::new());
        let id = a.id;
        let index = AssetIndex::from_assets([a]);
        assert!(matches!(resolve(&index, id), Err(ResolutionError::CircularDependency { .. })));
    }

    #[test]
    fn cycle_above_the_asset_is_also_reported() {
        let x = asset("x", Some("y"), PropertyMap::new());
        let y = asset("y", Some("z"), PropertyMap::new());
        let z = asset("z", Some("y"), PropertyMap::new());
        let id = x.id;
        let index = AssetIndex::from_assets([x, y, z]);
        assert_eq!(
            resolve(&index, id),
            Err(ResolutionError::CircularDependency { fqn: "x".into() })
        );
    }

    #[test]
    fn unknown_id_is_reported() {
        let index = AssetIndex::new();
        let id = AssetId::new();
        assert_eq!(resolve(&index, id), Err(ResolutionError::AssetNotFound { id }));
    }

    #[test]
    fn resolve_all_covers_broken_and_healthy_assets() {
        let ok = asset("ok", None, map_of([("a", 1)]));
        let broken = asset("broken", Some("gone"), PropertyMap::new());
        let (ok_id, broken_id) = (ok.id, broken.id);
        let results = resolve_all(&AssetIndex::from_assets([ok, broken]));
        assert!(results[&ok_id].is_ok());
        assert!(results[&broken_id].is_err());
    }
}
