use std::collections::BTreeMap;

use templar_core::{AssetId, AssetIndex, ChangeSet, UnmergedAsset};

use crate::error::EngineError;

/// Uncommitted edits: records written in this session and records removed
/// from it, each keyed by asset id.
///
/// A deleted record keeps its full data so that undo can put it back exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    upserted: BTreeMap<AssetId, UnmergedAsset>,
    deleted: BTreeMap<AssetId, UnmergedAsset>,
}

impl PendingChanges {
    pub fn upserted(&self) -> &BTreeMap<AssetId, UnmergedAsset> {
        &self.upserted
    }

    pub fn deleted(&self) -> &BTreeMap<AssetId, UnmergedAsset> {
        &self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.deleted.is_empty()
    }

    pub fn is_upserted(&self, id: AssetId) -> bool {
        self.upserted.contains_key(&id)
    }

    pub fn is_deleted(&self, id: AssetId) -> bool {
        self.deleted.contains_key(&id)
    }
}

/// The last committed asset set with the pending overlay on top.
///
/// Every engine read goes through the live view: an id in the deleted bucket
/// is gone, an id in the upserted bucket shadows its committed record.
#[derive(Debug, Clone)]
pub struct Workspace {
    committed: AssetIndex,
    pending: PendingChanges,
}

impl Workspace {
    pub fn new(committed: AssetIndex) -> Self {
        Self {
            committed,
            pending: PendingChanges::default(),
        }
    }

    pub fn committed(&self) -> &AssetIndex {
        &self.committed
    }

    pub fn pending(&self) -> &PendingChanges {
        &self.pending
    }

    pub fn live(&self, id: AssetId) -> Option<&UnmergedAsset> {
        if self.pending.deleted.contains_key(&id) {
            return None;
        }
        self.pending
            .upserted
            .get(&id)
            .or_else(|| self.committed.get(id))
    }

    pub fn require_live(&self, id: AssetId) -> Result<&UnmergedAsset, EngineError> {
        self.live(id)
            .ok_or_else(|| EngineError::AssetNotFound(id.to_string()))
    }

    /// Snapshot of the live view as an index.
    pub fn live_index(&self) -> AssetIndex {
        let mut index = self.committed.clone();
        for id in self.pending.deleted.keys() {
            index.remove(*id);
        }
        for asset in self.pending.upserted.values() {
            index.insert(asset.clone());
        }
        index
    }

    /// The payload for a commit. Deletions of records that were never
    /// committed are dropped: there is nothing to remove downstream.
    pub fn change_set(&self) -> ChangeSet {
        ChangeSet {
            upserted: self.pending.upserted.values().cloned().collect(),
            deleted: self
                .pending
                .deleted
                .keys()
                .copied()
                .filter(|id| self.committed.contains(*id))
                .collect(),
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.change_set().is_empty()
    }

    /// Replace the committed baseline and drop every pending change.
    pub fn reset(&mut self, committed: AssetIndex) {
        self.committed = committed;
        self.pending = PendingChanges::default();
    }

    pub fn discard_pending(&mut self) {
        self.pending = PendingChanges::default();
    }

    // ------------------------------------------------------------------
    // Bucket mutations, used by commands only.
    // ------------------------------------------------------------------

    /// Write `asset` as the live record for its id. A record identical to the
    /// committed one is not kept as a pending change.
    pub(crate) fn put(&mut self, asset: UnmergedAsset) {
        if self.committed.get(asset.id) == Some(&asset) {
            self.pending.upserted.remove(&asset.id);
        } else {
            self.pending.upserted.insert(asset.id, asset);
        }
    }

    pub(crate) fn restore_upserted(&mut self, asset: UnmergedAsset) {
        self.pending.upserted.insert(asset.id, asset);
    }

    pub(crate) fn take_upserted(&mut self, id: AssetId) -> Option<UnmergedAsset> {
        self.pending.upserted.remove(&id)
    }

    pub(crate) fn mark_deleted(&mut self, asset: UnmergedAsset) {
        self.pending.deleted.insert(asset.id, asset);
    }

    pub(crate) fn take_deleted(&mut self, id: AssetId) -> Option<UnmergedAsset> {
        self.pending.deleted.remove(&id)
    }
}
