use tracing::info;

use templar_core::{AssetIndex, ChangeSet, UnmergedAsset};

use crate::error::StorageError;
use crate::traits::{AssetStore, CommitReceipt, prepare_commit};

/// An in-memory store. Commits swap the whole index only after validation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    index: AssetIndex,
    commits: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store without validation, e.g. to reproduce a broken state.
    pub fn with_assets<I: IntoIterator<Item = UnmergedAsset>>(assets: I) -> Self {
        Self {
            index: AssetIndex::from_assets(assets),
            commits: 0,
        }
    }

    pub fn commit_count(&self) -> u64 {
        self.commits
    }
}

impl AssetStore for MemoryStore {
    fn load_unmerged_assets(&self) -> Result<Vec<UnmergedAsset>, StorageError> {
        Ok(self.index.iter().cloned().collect())
    }

    fn load_index(&self) -> Result<AssetIndex, StorageError> {
        Ok(self.index.clone())
    }

    fn commit_changes(&mut self, changes: &ChangeSet) -> Result<CommitReceipt, StorageError> {
        let next = prepare_commit(&self.index, changes)?;
        self.index = next;
        self.commits += 1;
        info!(
            upserted = changes.upserted.len(),
            deleted = changes.deleted.len(),
            "memory store commit"
        );
        Ok(CommitReceipt {
            upserted: changes.upserted.len(),
            deleted: changes.deleted.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use templar_core::{AssetId, AssetType, value::PropertyMap};

    fn asset(fqn: &str, template: Option<&str>) -> UnmergedAsset {
        UnmergedAsset::new(AssetId::new(), fqn, AssetType::Node, template, PropertyMap::new())
            .unwrap()
    }

    #[test]
    fn rejected_commit_leaves_store_untouched() {
        let base = asset("base", None);
        let mut store = MemoryStore::with_assets([base.clone()]);
        let changes = ChangeSet {
            upserted: vec![asset("base", None)],
            deleted: vec![],
        };
        assert!(matches!(store.commit_changes(&changes), Err(StorageError::Validation(_))));
        assert_eq!(store.load_all_assets().unwrap().len(), 1);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn details_and_preview() {
        let base = asset("base", None);
        let child = asset("child", Some("base"));
        let mut store = MemoryStore::new();
        store
            .commit_changes(&ChangeSet {
                upserted: vec![base.clone(), child.clone()],
                deleted: vec![],
            })
            .unwrap();

        let details = store.load_asset_details(child.id).unwrap();
        assert_eq!(details.unmerged, child);
        assert_eq!(details.merged.unwrap().inheritance_chain, vec!["base"]);

        // deleting the template in a hypothetical change breaks the child
        let preview = store
            .preview_merged_assets(
                &ChangeSet {
                    upserted: vec![],
                    deleted: vec![base.id],
                },
                &[child.id],
            )
            .unwrap();
        assert!(preview[0].merged.is_err());
        assert!(store.load_asset_details(AssetId::new()).is_err());
    }
}
