use templar_core::{AssetId, UnmergedAsset};

use super::Command;
use crate::error::EngineError;
use crate::overlay::Workspace;

/// Replace one asset record with another.
///
/// Both directions go through [`Workspace::put`], so undoing back to the
/// committed record leaves no pending entry for the id.
#[derive(Debug, Clone)]
pub struct UpdateAsset {
    old: UnmergedAsset,
    new: UnmergedAsset,
}

impl UpdateAsset {
    pub fn new(old: UnmergedAsset, new: UnmergedAsset) -> Result<Self, EngineError> {
        if old.id != new.id {
            return Err(EngineError::StaleCommand(format!(
                "update cannot change id {} to {}",
                old.id, new.id
            )));
        }
        new.check_key()?;
        Ok(Self { old, new })
    }

    /// Update against whatever is live for `new.id` right now.
    pub fn from_workspace(workspace: &Workspace, new: UnmergedAsset) -> Result<Self, EngineError> {
        let old = workspace.require_live(new.id)?.clone();
        Self::new(old, new)
    }

    pub fn id(&self) -> AssetId {
        self.new.id
    }

    pub fn old(&self) -> &UnmergedAsset {
        &self.old
    }

    pub fn new_record(&self) -> &UnmergedAsset {
        &self.new
    }

    fn swap(
        workspace: &mut Workspace,
        expected: &UnmergedAsset,
        replacement: &UnmergedAsset,
    ) -> Result<(), EngineError> {
        if workspace.live(expected.id) != Some(expected) {
            return Err(EngineError::StaleCommand(expected.fqn.clone()));
        }
        workspace.put(replacement.clone());
        Ok(())
    }
}

impl Command for UpdateAsset {
    fn label(&self) -> String {
        if self.old.fqn != self.new.fqn {
            format!("Rename {} to {}", self.old.fqn, self.new.fqn)
        } else {
            format!("Update {}", self.new.fqn)
        }
    }

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        Self::swap(workspace, &self.old, &self.new)
    }

    fn unexecute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        Self::swap(workspace, &self.new, &self.old)
    }
}
