use std::collections::BTreeMap;

use templar_core::{AssetId, AssetType, ChangeSet, PropertyMap, UnmergedAsset};
use templar_storage::{AssetStore, MemoryStore, SqliteStore, StorageError};

/// Builds a committed asset set by fqn, remembering the id assigned to each.
#[derive(Debug, Clone, Default)]
pub struct SeedSet {
    assets: Vec<UnmergedAsset>,
    ids: BTreeMap<String, AssetId>,
}

impl SeedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset. Panics on a malformed fqn; seeds are test input.
    pub fn add(
        mut self,
        fqn: &str,
        asset_type: AssetType,
        template_fqn: Option<&str>,
        overrides: PropertyMap,
    ) -> Self {
        let asset = UnmergedAsset::new(AssetId::new(), fqn, asset_type, template_fqn, overrides)
            .unwrap_or_else(|e| panic!("bad seed asset {fqn}: {e}"));
        self.ids.insert(fqn.to_string(), asset.id);
        self.assets.push(asset);
        self
    }

    pub fn folder(self, fqn: &str) -> Self {
        self.add(fqn, AssetType::Folder, None, PropertyMap::new())
    }

    pub fn node(self, fqn: &str, template_fqn: Option<&str>, overrides: PropertyMap) -> Self {
        self.add(fqn, AssetType::Node, template_fqn, overrides)
    }

    /// Id of the seeded asset at `fqn`. Panics if it was never added.
    pub fn id(&self, fqn: &str) -> AssetId {
        match self.ids.get(fqn) {
            Some(id) => *id,
            None => panic!("no seeded asset at {fqn}"),
        }
    }

    pub fn assets(&self) -> &[UnmergedAsset] {
        &self.assets
    }

    /// Unvalidated in-memory store, so broken sets can be seeded too.
    pub fn memory_store(&self) -> MemoryStore {
        MemoryStore::with_assets(self.assets.iter().cloned())
    }

    /// Write the seed through a regular commit.
    pub fn commit_into<S: AssetStore>(&self, store: &mut S) -> Result<(), StorageError> {
        store.commit_changes(&ChangeSet {
            upserted: self.assets.clone(),
            deleted: Vec::new(),
        })?;
        Ok(())
    }

    pub fn sqlite_store(&self, path: &str) -> Result<SqliteStore, StorageError> {
        let mut store = SqliteStore::open(path)?;
        self.commit_into(&mut store)?;
        Ok(store)
    }
}
