use tracing::debug;

use templar_core::{
    Asset, AssetId, AssetIndex, ChangeSet, UnmergedAsset,
    merge::{self, MergeResult},
    validate::validate_asset_set,
};

use crate::error::StorageError;

/// An asset record together with its resolution against the committed set.
#[derive(Debug, Clone)]
pub struct AssetDetails {
    pub unmerged: UnmergedAsset,
    pub merged: MergeResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPreview {
    pub id: AssetId,
    pub merged: MergeResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub upserted: usize,
    pub deleted: usize,
}

/// The persistence collaborator behind an edit session.
///
/// Implementations only need to load and atomically replace records; the
/// remaining methods are derived from those two.
pub trait AssetStore {
    /// Every committed record, overrides included.
    fn load_unmerged_assets(&self) -> Result<Vec<UnmergedAsset>, StorageError>;

    /// Validate `changes` against the committed set and write them. Either
    /// every change lands or none does.
    fn commit_changes(&mut self, changes: &ChangeSet) -> Result<CommitReceipt, StorageError>;

    /// Lightweight listing of every committed asset.
    fn load_all_assets(&self) -> Result<Vec<Asset>, StorageError> {
        Ok(self
            .load_unmerged_assets()?
            .iter()
            .map(UnmergedAsset::summary)
            .collect())
    }

    fn load_index(&self) -> Result<AssetIndex, StorageError> {
        Ok(AssetIndex::from_assets(self.load_unmerged_assets()?))
    }

    fn load_asset_details(&self, id: AssetId) -> Result<AssetDetails, StorageError> {
        let index = self.load_index()?;
        let unmerged = index
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let merged = merge::resolve(&index, id);
        Ok(AssetDetails { unmerged, merged })
    }

    /// Merge results for `open_ids` as if `changes` had been committed.
    fn preview_merged_assets(
        &self,
        changes: &ChangeSet,
        open_ids: &[AssetId],
    ) -> Result<Vec<MergedPreview>, StorageError> {
        let index = self.load_index()?.with_changes(changes);
        Ok(open_ids
            .iter()
            .map(|id| MergedPreview {
                id: *id,
                merged: merge::resolve(&index, *id),
            })
            .collect())
    }
}

/// Apply `changes` to `committed` and validate the result. Returns the
/// post-commit index when every asset is unique and resolvable.
pub fn prepare_commit(
    committed: &AssetIndex,
    changes: &ChangeSet,
) -> Result<AssetIndex, StorageError> {
    if let Some(missing) = changes.deleted.iter().find(|id| !committed.contains(**id)) {
        return Err(StorageError::NotFound(missing.to_string()));
    }
    let next = committed.with_changes(changes);
    let report = validate_asset_set(&next);
    if !report.is_empty() {
        debug!(problems = report.problem_count(), "commit validation failed");
        return Err(StorageError::Validation(report));
    }
    Ok(next)
}
