use templar_core::{AssetId, UnmergedAsset, fqn, value::PropertyMap};

use super::Command;
use crate::error::EngineError;
use crate::overlay::Workspace;

/// Create an asset that points at `source` as its template, with no local
/// overrides of its own.
#[derive(Debug, Clone)]
pub struct DeriveAsset {
    asset: UnmergedAsset,
}

impl DeriveAsset {
    pub fn new(
        source: &UnmergedAsset,
        parent_fqn: Option<&str>,
        key: &str,
    ) -> Result<Self, EngineError> {
        fqn::validate_key(key)?;
        let asset = UnmergedAsset::new(
            AssetId::new(),
            &fqn::join(parent_fqn, key),
            source.asset_type,
            Some(&source.fqn),
            PropertyMap::new(),
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

impl Command for DeriveAsset {
    fn label(&self) -> String {
        format!(
            "Derive {} from {}",
            self.asset.fqn,
            self.asset.template_fqn.as_deref().unwrap_or_default()
        )
    }

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        if workspace.live(self.asset.id).is_some() {
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
