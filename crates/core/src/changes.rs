use serde::{Deserialize, Serialize};

use crate::asset::UnmergedAsset;
use crate::ids::AssetId;

/// The payload handed to persistence at a commit boundary: every record to
/// write and every id to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub upserted: Vec<UnmergedAsset>,
    pub deleted: Vec<AssetId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.upserted.len() + self.deleted.len()
    }
}
