use templar_core::{
    AssetId, AssetType, EngineContext, UnmergedAsset, fqn,
    value::{PropertyMap, deep_merge},
};

use super::Command;
use crate::error::EngineError;
use crate::overlay::Workspace;

/// Add a brand-new asset. The id is fixed at construction so that redo
/// recreates the same record.
#[derive(Debug, Clone)]
pub struct CreateAsset {
    asset: UnmergedAsset,
}

impl CreateAsset {
    /// Seed overrides from the type's declared initial overrides, with
    /// `overrides` merged on top.
    pub fn new(
        context: &EngineContext,
        parent_fqn: Option<&str>,
        key: &str,
        asset_type: AssetType,
        template_fqn: Option<&str>,
        overrides: PropertyMap,
    ) -> Result<Self, EngineError> {
        fqn::validate_key(key)?;
        let mut seeded = context.types.initial_overrides(asset_type);
        deep_merge(&mut seeded, &overrides);
        let asset = UnmergedAsset::new(
            AssetId::new(),
            &fqn::join(parent_fqn, key),
            asset_type,
            template_fqn,
            seeded,
        )?;
        Ok(Self { asset })
    }

    pub fn asset(&self) -> &UnmergedAsset {
        &self.asset
    }

    pub fn id(&self) -> AssetId {
        self.asset.id
    }
}

impl Command for CreateAsset {
    fn label(&self) -> String {
        format!("Create {}", self.asset.fqn)
    }

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        if workspace.live(self.asset.id).is_some()
            || workspace.pending().is_deleted(self.asset.id)
        {
            return Err(EngineError::AssetExists(self.asset.id.to_string()));
        }
        workspace.put(self.asset.clone());
        Ok(())
    }

    fn unexecute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        workspace
            .take_upserted(self.asset.id)
            .map(|_| ())
            .ok_or_else(|| EngineError::StaleCommand(self.asset.fqn.clone()))
    }
}
