use std::collections::{BTreeMap, BTreeSet};

use crate::asset::UnmergedAsset;
use crate::changes::ChangeSet;
use crate::fqn;
use crate::ids::AssetId;

/// A set of live asset records, addressable by id and by fqn.
///
/// Fqns are expected to be unique but the index tolerates collisions so that
/// an in-progress edit session can be inspected; [`AssetIndex::fqn_collisions`]
/// reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetIndex {
    assets: BTreeMap<AssetId, UnmergedAsset>,
    by_fqn: BTreeMap<String, BTreeSet<AssetId>>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assets<I: IntoIterator<Item = UnmergedAsset>>(assets: I) -> Self {
        let mut index = Self::new();
        for asset in assets {
            index.insert(asset);
        }
        index
    }

    /// Insert or replace the record with `asset.id`.
    pub fn insert(&mut self, asset: UnmergedAsset) -> Option<UnmergedAsset> {
        let previous = self.remove(asset.id);
        self.by_fqn
            .entry(asset.fqn.clone())
            .or_default()
            .insert(asset.id);
        self.assets.insert(asset.id, asset);
        previous
    }

    pub fn remove(&mut self, id: AssetId) -> Option<UnmergedAsset> {
        let removed = self.assets.remove(&id)?;
        if let Some(ids) = self.by_fqn.get_mut(&removed.fqn) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_fqn.remove(&removed.fqn);
            }
        }
        Some(removed)
    }

    /// Copy of this index with `changes` applied: deletions first, then upserts.
    pub fn with_changes(&self, changes: &ChangeSet) -> Self {
        let mut next = self.clone();
        for id in &changes.deleted {
            next.remove(*id);
        }
        for asset in &changes.upserted {
            next.insert(asset.clone());
        }
        next
    }

    pub fn get(&self, id: AssetId) -> Option<&UnmergedAsset> {
        self.assets.get(&id)
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.assets.contains_key(&id)
    }

    pub fn by_fqn(&self, fqn: &str) -> Option<&UnmergedAsset> {
        self.by_fqn
            .get(fqn)
            .and_then(|ids| ids.first())
            .and_then(|id| self.assets.get(id))
    }

    pub fn contains_fqn(&self, fqn: &str) -> bool {
        self.by_fqn.contains_key(fqn)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnmergedAsset> {
        self.assets.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.assets.keys().copied()
    }

    /// Assets exactly one level below `parent_fqn`, ordered by fqn.
    pub fn children_of(&self, parent_fqn: &str) -> Vec<&UnmergedAsset> {
        self.sorted(|a| fqn::is_child_of(&a.fqn, parent_fqn))
    }

    /// Every asset anywhere below `ancestor_fqn`, ordered by fqn.
    pub fn descendants_of(&self, ancestor_fqn: &str) -> Vec<&UnmergedAsset> {
        self.sorted(|a| fqn::is_descendant_of(&a.fqn, ancestor_fqn))
    }

    /// Assets whose template is exactly `template_fqn`, ordered by fqn.
    pub fn dependents_of(&self, template_fqn: &str) -> Vec<&UnmergedAsset> {
        self.sorted(|a| a.template_fqn.as_deref() == Some(template_fqn))
    }

    /// Template fqn to the ids of its direct dependents.
    pub fn dependency_map(&self) -> BTreeMap<&str, Vec<AssetId>> {
        let mut map: BTreeMap<&str, Vec<AssetId>> = BTreeMap::new();
        for asset in self.assets.values() {
            if let Some(template) = asset.template_fqn.as_deref() {
                map.entry(template).or_default().push(asset.id);
            }
        }
        map
    }

    /// Every fqn held by more than one asset, with the ids that claim it.
    pub fn fqn_collisions(&self) -> Vec<(String, Vec<AssetId>)> {
        self.by_fqn
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(fqn, ids)| (fqn.clone(), ids.iter().copied().collect()))
            .collect()
    }

    fn sorted(&self, pred: impl Fn(&UnmergedAsset) -> bool) -> Vec<&UnmergedAsset> {
        let mut out: Vec<&UnmergedAsset> = self.assets.values().filter(|a| pred(a)).collect();
        out.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        out
    }
}
