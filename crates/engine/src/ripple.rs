//! Indirect property changes caused by editing templates in place.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use templar_core::{AssetId, PropertyChange, diff, fqn, merge};

use crate::overlay::Workspace;

/// One dependent whose resolved properties would change.
#[derive(Debug, Clone, PartialEq)]
pub struct RippleEntry {
    pub id: AssetId,
    pub fqn: String,
    pub changes: Vec<PropertyChange>,
}

/// Ripple entries grouped by top-level namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RippleReport {
    pub groups: BTreeMap<String, Vec<RippleEntry>>,
}

impl RippleReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn entry(&self, id: AssetId) -> Option<&RippleEntry> {
        self.groups.values().flatten().find(|e| e.id == id)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

/// Compare every transitive dependent of an edited template before and after
/// the pending overlay.
///
/// Dependencies are read from the committed set. Directly edited assets are
/// walked through but never reported; their own diff is already visible.
pub fn analyze(workspace: &Workspace) -> RippleReport {
    let before = workspace.committed();
    let after = workspace.live_index();
    let dependencies = before.dependency_map();
    let edited = workspace.pending().upserted();

    let mut queue: VecDeque<String> = VecDeque::new();
    for asset in edited.values() {
        let committed_fqn = before.get(asset.id).map(|a| a.fqn.as_str());
        for candidate in [committed_fqn, Some(asset.fqn.as_str())].into_iter().flatten() {
            if dependencies.contains_key(candidate) {
                queue.push_back(candidate.to_string());
            }
        }
    }

    let mut seen_fqns: BTreeSet<String> = queue.iter().cloned().collect();
    let mut affected: BTreeSet<AssetId> = BTreeSet::new();
    while let Some(template_fqn) = queue.pop_front() {
        let Some(dependents) = dependencies.get(template_fqn.as_str()) else {
            continue;
        };
        for id in dependents {
            if !edited.contains_key(id) {
                affected.insert(*id);
            }
            if let Some(dependent) = before.get(*id)
                && seen_fqns.insert(dependent.fqn.clone())
            {
                queue.push_back(dependent.fqn.clone());
            }
        }
    }

    let mut report = RippleReport::default();
    for id in affected {
        let (Ok(old), Ok(new)) = (merge::resolve(before, id), merge::resolve(&after, id)) else {
            continue;
        };
        let changes = diff::diff(Some(&old.properties), Some(&new.properties));
        if changes.is_empty() {
            continue;
        }
        let Some(asset) = after.get(id) else {
            continue;
        };
        report
            .groups
            .entry(fqn::namespace(&asset.fqn).to_string())
            .or_default()
            .push(RippleEntry {
                id,
                fqn: asset.fqn.clone(),
                changes,
            });
    }
    for entries in report.groups.values_mut() {
        entries.sort_by(|a, b| a.fqn.cmp(&b.fqn));
    }

    debug!(
        namespaces = report.groups.len(),
        entries = report.entry_count(),
        "ripple analysis complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use templar_core::{
        AssetIndex, AssetType, ChangeType, UnmergedAsset,
        value::{PropertyMap, PropertyValue, map_of},
    };

    fn asset(fqn: &str, template: Option<&str>, overrides: PropertyMap) -> UnmergedAsset {
        UnmergedAsset::new(AssetId::new(), fqn, AssetType::Node, template, overrides).unwrap()
    }

    #[test]
    fn transitive_dependents_are_grouped_by_namespace() {
        let base = asset("templates::Base", None, map_of([("cpu", 2)]));
        let mid = asset("templates::Mid", Some("templates::Base"), PropertyMap::new());
        let prod = asset("prod::Web", Some("templates::Mid"), PropertyMap::new());
        let staging = asset("staging::Web", Some("templates::Base"), PropertyMap::new());
        let pinned = asset("staging::Pinned", Some("templates::Base"), map_of([("cpu", 8)]));
        let mut ws = Workspace::new(AssetIndex::from_assets([
            base.clone(),
            mid.clone(),
            prod.clone(),
            staging.clone(),
            pinned.clone(),
        ]));

        ws.put(base.with_overrides(map_of([("cpu", 4)])));
        let report = analyze(&ws);

        assert_eq!(report.namespaces().collect::<Vec<_>>(), vec!["prod", "staging", "templates"]);
        let prod_entry = report.entry(prod.id).unwrap();
        assert_eq!(prod_entry.changes.len(), 1);
        assert_eq!(prod_entry.changes[0].change_type, ChangeType::Modified);
        assert_eq!(prod_entry.changes[0].new_value, Some(PropertyValue::Integer(4)));
        assert!(report.entry(staging.id).is_some());
        assert!(report.entry(mid.id).is_some());
        assert!(report.entry(pinned.id).is_none());
        assert!(report.entry(base.id).is_none());
    }

    #[test]
    fn edited_dependents_are_traversed_but_not_reported() {
        let base = asset("t::Base", None, map_of([("mem", 1)]));
        let mid = asset("t::Mid", Some("t::Base"), PropertyMap::new());
        let leaf = asset("p::Leaf", Some("t::Mid"), PropertyMap::new());
        let mut ws =
            Workspace::new(AssetIndex::from_assets([base.clone(), mid.clone(), leaf.clone()]));

        ws.put(base.with_overrides(map_of([("mem", 2)])));
        ws.put(mid.with_overrides(map_of([("disk", 10)])));
        let report = analyze(&ws);

        assert!(report.entry(mid.id).is_none());
        assert_eq!(report.entry(leaf.id).unwrap().changes.len(), 2);
    }

    #[test]
    fn no_pending_edits_means_no_ripple() {
        let base = asset("t::Base", None, PropertyMap::new());
        let dependent = asset("p::Dep", Some("t::Base"), PropertyMap::new());
        let ws = Workspace::new(AssetIndex::from_assets([base, dependent]));
        assert!(analyze(&ws).is_empty());
    }
}
