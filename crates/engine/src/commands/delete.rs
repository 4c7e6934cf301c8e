use std::collections::BTreeSet;

use templar_core::{AssetId, UnmergedAsset};

use super::Command;
use crate::error::EngineError;
use crate::overlay::Workspace;

#[derive(Debug, Clone)]
struct Removed {
    asset: UnmergedAsset,
    /// The pending entry the id had before deletion, restored on undo.
    prior_upsert: Option<UnmergedAsset>,
}

/// Move a batch of assets into the deleted bucket.
#[derive(Debug, Clone)]
pub struct DeleteAssets {
    ids: Vec<AssetId>,
    removed: Vec<Removed>,
}

impl DeleteAssets {
    pub fn new(ids: Vec<AssetId>) -> Self {
        let mut seen = BTreeSet::new();
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self {
            ids,
            removed: Vec::new(),
        }
    }

    pub fn ids(&self) -> &[AssetId] {
        &self.ids
    }
}

impl Command for DeleteAssets {
    fn label(&self) -> String {
        match self.removed.as_slice() {
            [only] => format!("Delete {}", only.asset.fqn),
            _ => format!("Delete {} assets", self.ids.len()),
        }
    }

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        // Resolve the whole batch before touching anything.
        let assets = self
            .ids
            .iter()
            .map(|id| workspace.require_live(*id).cloned())
            .collect::<Result<Vec<_>, _>>()?;

        self.removed.clear();
        for asset in assets {
            let prior_upsert = workspace.take_upserted(asset.id);
            workspace.mark_deleted(asset.clone());
            self.removed.push(Removed { asset, prior_upsert });
        }
        Ok(())
    }

    fn unexecute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        if let Some(missing) = self
            .removed
            .iter()
            .find(|r| !workspace.pending().is_deleted(r.asset.id))
        {
            return Err(EngineError::StaleCommand(missing.asset.fqn.clone()));
        }
        for removed in self.removed.iter().rev() {
            workspace.take_deleted(removed.asset.id);
            if let Some(prior) = &removed.prior_upsert {
                workspace.restore_upserted(prior.clone());
            }
        }
        Ok(())
    }
}
