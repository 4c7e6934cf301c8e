pub mod commands;
pub mod error;
pub mod overlay;
pub mod refactor;
pub mod ripple;
pub mod undo;

pub use commands::Command;
pub use error::EngineError;
pub use overlay::{PendingChanges, Workspace};
pub use refactor::{ApplyRefactoring, FqnUpdate, RefactorConsequences, TemplateLinkUpdate};
pub use ripple::{RippleEntry, RippleReport};

use std::sync::Arc;

use tracing::{debug, info, warn};

use templar_core::{
    Asset, AssetId, AssetType, ChangeSet, EngineContext, MergeResult, PropertyChange, PropertyValue,
    UnmergedAsset,
    context::Placement,
    diff, fqn,
    merge::{self, ChainEnd},
    value::{PropertyMap, remove_path, set_path, split_dotted},
};
use templar_storage::{AssetStore, CommitReceipt, MergedPreview, StorageError, prepare_commit};

use crate::commands::{
    CloneAsset, CreateAsset, DeleteAssets, DeriveAsset, UpdateAsset, rebase_onto_shareable,
};
use crate::undo::CommandLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoResult {
    Applied { label: String },
    Empty,
}

/// What happened to a rename or move request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefactorOutcome {
    /// Only the target moved; the change is already on the undo stack.
    Applied(RefactorConsequences),
    /// Other assets would change too. Nothing was applied; pass the
    /// consequences to [`EditSession::apply_refactor`] once confirmed.
    NeedsConfirmation(RefactorConsequences),
}

/// Template chain of one asset in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    /// Ancestor fqns, root-most first.
    pub fqns: Vec<String>,
    pub end: ChainEnd,
}

/// One operator's editing session over a committed asset set.
///
/// Every mutation runs as a [`Command`] against the pending overlay and lands
/// on the undo stack. Nothing reaches the store until [`EditSession::commit`].
pub struct EditSession<S: AssetStore> {
    context: Arc<EngineContext>,
    store: S,
    workspace: Workspace,
    log: CommandLog,
    ripple: Option<RippleReport>,
}

impl<S: AssetStore> EditSession<S> {
    pub fn open(context: Arc<EngineContext>, store: S) -> Result<Self, EngineError> {
        let committed = store.load_index()?;
        info!(assets = committed.len(), "edit session opened");
        Ok(Self {
            log: CommandLog::new(context.undo_depth),
            context,
            store,
            workspace: Workspace::new(committed),
            ripple: None,
        })
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    // ========================================================================
    // Command execution
    // ========================================================================

    /// Run `command` against the overlay and record it. Clears the redo stack.
    pub fn execute(&mut self, mut command: Box<dyn Command>) -> Result<(), EngineError> {
        command.execute(&mut self.workspace)?;
        self.record(command);
        Ok(())
    }

    fn record(&mut self, command: Box<dyn Command>) {
        debug!(command = %command.label(), "executed");
        self.log.push_undo(command);
        self.log.clear_redo();
        self.ripple = None;
    }

    /// Reverse the most recent command. A command that fails to reverse stays
    /// on the undo stack.
    pub fn undo(&mut self) -> Result<UndoResult, EngineError> {
        let Some(mut command) = self.log.pop_undo() else {
            return Ok(UndoResult::Empty);
        };
        if let Err(e) = command.unexecute(&mut self.workspace) {
            warn!(command = %command.label(), error = %e, "undo failed");
            self.log.push_undo(command);
            return Err(e);
        }
        let label = command.label();
        debug!(command = %label, "undone");
        self.log.push_redo(command);
        self.ripple = None;
        Ok(UndoResult::Applied { label })
    }

    /// Re-run the most recently undone command.
    pub fn redo(&mut self) -> Result<UndoResult, EngineError> {
        let Some(mut command) = self.log.pop_redo() else {
            return Ok(UndoResult::Empty);
        };
        if let Err(e) = command.execute(&mut self.workspace) {
            warn!(command = %command.label(), error = %e, "redo failed");
            self.log.push_redo(command);
            return Err(e);
        }
        let label = command.label();
        debug!(command = %label, "redone");
        self.log.push_undo(command);
        self.ripple = None;
        Ok(UndoResult::Applied { label })
    }

    pub fn can_undo(&self) -> bool {
        self.log.undo_depth() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.log.redo_depth() > 0
    }

    pub fn undo_label(&self) -> Option<String> {
        self.log.undo_label()
    }

    pub fn redo_label(&self) -> Option<String> {
        self.log.redo_label()
    }

    // ========================================================================
    // Intents
    // ========================================================================

    fn check_placement(
        &self,
        parent_fqn: Option<&str>,
        child_type: AssetType,
    ) -> Result<(), EngineError> {
        let Some(parent_fqn) = parent_fqn else {
            return Ok(());
        };
        let live = self.workspace.live_index();
        let parent = live
            .by_fqn(parent_fqn)
            .ok_or_else(|| EngineError::AssetNotFound(parent_fqn.to_string()))?;
        match self.context.placement.check(parent.asset_type, child_type) {
            Placement::Allowed => Ok(()),
            Placement::Denied { reason } => Err(EngineError::PlacementDenied {
                parent: parent_fqn.to_string(),
                child_type,
                reason,
            }),
        }
    }

    fn check_fqn_free(&self, target: &str) -> Result<(), EngineError> {
        if self.workspace.live_index().contains_fqn(target) {
            return Err(EngineError::FqnTaken(target.to_string()));
        }
        Ok(())
    }

    pub fn create_asset(
        &mut self,
        parent_fqn: Option<&str>,
        key: &str,
        asset_type: AssetType,
        template_fqn: Option<&str>,
        overrides: PropertyMap,
    ) -> Result<AssetId, EngineError> {
        self.check_placement(parent_fqn, asset_type)?;
        let command = CreateAsset::new(
            &self.context,
            parent_fqn,
            key,
            asset_type,
            template_fqn,
            overrides,
        )?;
        self.check_fqn_free(&command.asset().fqn)?;
        let id = command.id();
        self.execute(Box::new(command))?;
        Ok(id)
    }

    /// Replace the live record for `asset.id` wholesale. A replacement equal
    /// to the live record is not recorded.
    pub fn update_asset(&mut self, asset: UnmergedAsset) -> Result<(), EngineError> {
        let command = UpdateAsset::from_workspace(&self.workspace, asset)?;
        if command.old() == command.new_record() {
            return Ok(());
        }
        self.execute(Box::new(command))
    }

    /// Set the override at dotted `path`, creating intermediate maps.
    pub fn set_property(
        &mut self,
        id: AssetId,
        path: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), EngineError> {
        let current = self.workspace.require_live(id)?;
        let mut overrides = current.overrides.clone();
        set_path(&mut overrides, &split_dotted(path), value.into());
        let updated = current.with_overrides(overrides);
        self.update_asset(updated)
    }

    /// Remove the override at dotted `path`. Returns false when there was none.
    pub fn clear_property(&mut self, id: AssetId, path: &str) -> Result<bool, EngineError> {
        let current = self.workspace.require_live(id)?;
        let mut overrides = current.overrides.clone();
        if remove_path(&mut overrides, &split_dotted(path)).is_none() {
            return Ok(false);
        }
        let updated = current.with_overrides(overrides);
        self.update_asset(updated)?;
        Ok(true)
    }

    /// Delete `ids` and everything beneath them as one step. Returns the
    /// number of assets removed.
    pub fn delete_assets(&mut self, ids: &[AssetId]) -> Result<usize, EngineError> {
        let live = self.workspace.live_index();
        let mut batch = Vec::new();
        for id in ids {
            let asset = live
                .get(*id)
                .ok_or_else(|| EngineError::AssetNotFound(id.to_string()))?;
            batch.push(asset.id);
            batch.extend(live.descendants_of(&asset.fqn).iter().map(|a| a.id));
        }
        let command = DeleteAssets::new(batch);
        let count = command.ids().len();
        if count == 0 {
            return Ok(0);
        }
        self.execute(Box::new(command))?;
        Ok(count)
    }

    /// Copy `source_id` and its subtree to `new_parent::new_key`. With
    /// `rebase` set, external template chains are flattened onto the nearest
    /// shareable template. Returns the id of the cloned root.
    pub fn clone_asset(
        &mut self,
        source_id: AssetId,
        new_parent: Option<&str>,
        new_key: &str,
        rebase: bool,
    ) -> Result<AssetId, EngineError> {
        let source_type = self.workspace.require_live(source_id)?.asset_type;
        self.check_placement(new_parent, source_type)?;
        let mut command = CloneAsset::new(source_id, new_parent, new_key)?;
        self.check_fqn_free(&command.target_fqn())?;
        if rebase {
            command = command.with_hook(rebase_onto_shareable(Arc::clone(&self.context)));
        }
        command.execute(&mut self.workspace)?;
        let root = command
            .root_id()
            .ok_or_else(|| EngineError::AssetNotFound(source_id.to_string()))?;
        self.record(Box::new(command));
        Ok(root)
    }

    /// New asset at `parent_fqn::key` inheriting everything from `source_id`.
    pub fn derive_asset(
        &mut self,
        source_id: AssetId,
        parent_fqn: Option<&str>,
        key: &str,
    ) -> Result<AssetId, EngineError> {
        let source = self.workspace.require_live(source_id)?.clone();
        self.check_placement(parent_fqn, source.asset_type)?;
        let command = DeriveAsset::new(&source, parent_fqn, key)?;
        self.check_fqn_free(&command.asset().fqn)?;
        let id = command.id();
        self.execute(Box::new(command))?;
        Ok(id)
    }

    // ========================================================================
    // Refactoring
    // ========================================================================

    /// Dry run of moving `id` to `new_fqn`.
    pub fn plan_refactor(
        &self,
        id: AssetId,
        new_fqn: &str,
    ) -> Result<RefactorConsequences, EngineError> {
        refactor::calculate(&self.workspace.live_index(), id, new_fqn)
    }

    /// Apply previously planned consequences as one undo step. Fails if the
    /// target has moved since planning.
    pub fn apply_refactor(
        &mut self,
        consequences: RefactorConsequences,
    ) -> Result<(), EngineError> {
        if consequences.is_noop() {
            return Ok(());
        }
        let live = self.workspace.live_index();
        let target = live
            .get(consequences.target)
            .ok_or_else(|| EngineError::AssetNotFound(consequences.target.to_string()))?;
        if target.fqn != consequences.old_fqn {
            return Err(EngineError::StaleCommand(consequences.old_fqn));
        }
        let command = ApplyRefactoring::new(&live, consequences)?;
        info!(
            command = %command.label(),
            affected = command.consequences().affected_ids().len(),
            "applying refactor"
        );
        self.execute(Box::new(command))
    }

    pub fn rename_asset(
        &mut self,
        id: AssetId,
        new_key: &str,
    ) -> Result<RefactorOutcome, EngineError> {
        fqn::validate_key(new_key)?;
        let current = self.workspace.require_live(id)?;
        let new_fqn = fqn::join(current.parent_fqn(), new_key);
        self.refactor_to(id, &new_fqn)
    }

    pub fn move_asset(
        &mut self,
        id: AssetId,
        new_parent: Option<&str>,
    ) -> Result<RefactorOutcome, EngineError> {
        let current = self.workspace.require_live(id)?;
        let (asset_type, new_fqn) = (current.asset_type, fqn::join(new_parent, &current.asset_key));
        self.check_placement(new_parent, asset_type)?;
        self.refactor_to(id, &new_fqn)
    }

    fn refactor_to(&mut self, id: AssetId, new_fqn: &str) -> Result<RefactorOutcome, EngineError> {
        let consequences = self.plan_refactor(id, new_fqn)?;
        if !consequences.is_trivial() {
            return Ok(RefactorOutcome::NeedsConfirmation(consequences));
        }
        self.apply_refactor(consequences.clone())?;
        Ok(RefactorOutcome::Applied(consequences))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn live_asset(&self, id: AssetId) -> Option<&UnmergedAsset> {
        self.workspace.live(id)
    }

    /// Every live asset, ordered by fqn.
    pub fn list_assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self
            .workspace
            .live_index()
            .iter()
            .map(UnmergedAsset::summary)
            .collect();
        assets.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        assets
    }

    pub fn resolve(&self, id: AssetId) -> MergeResult {
        merge::resolve(&self.workspace.live_index(), id)
    }

    pub fn inheritance_chain(&self, id: AssetId) -> Result<ChainSummary, EngineError> {
        let live = self.workspace.live_index();
        let asset = live
            .get(id)
            .ok_or_else(|| EngineError::AssetNotFound(id.to_string()))?;
        let chain = merge::inheritance_chain(asset, &live);
        Ok(ChainSummary {
            fqns: chain.fqns_root_first(),
            end: chain.end,
        })
    }

    /// Resolved properties of `id` as committed versus as live. An asset
    /// that fails to resolve on one side contributes an empty tree.
    pub fn property_diff(&self, id: AssetId) -> Result<Vec<PropertyChange>, EngineError> {
        let committed = self.workspace.committed();
        if !committed.contains(id) && self.workspace.live(id).is_none() {
            return Err(EngineError::AssetNotFound(id.to_string()));
        }
        let before = merge::resolve(committed, id).ok().map(|m| m.properties);
        let after = self.resolve(id).ok().map(|m| m.properties);
        Ok(diff::diff(before.as_ref(), after.as_ref()))
    }

    pub fn pending_changes(&self) -> ChangeSet {
        self.workspace.change_set()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.workspace.has_pending_changes()
    }

    // ========================================================================
    // Ripple
    // ========================================================================

    pub fn recompute_ripple(&mut self) -> &RippleReport {
        self.ripple.insert(ripple::analyze(&self.workspace))
    }

    /// The last computed report, or `None` if a command has run since.
    pub fn ripple(&self) -> Option<&RippleReport> {
        self.ripple.as_ref()
    }

    // ========================================================================
    // Commit boundary
    // ========================================================================

    pub fn preview_merged(&self, open_ids: &[AssetId]) -> Result<Vec<MergedPreview>, EngineError> {
        Ok(self
            .store
            .preview_merged_assets(&self.workspace.change_set(), open_ids)?)
    }

    /// Validate and hand every pending change to the store. On failure the
    /// overlay and history are left exactly as they were.
    pub fn commit(&mut self) -> Result<CommitReceipt, EngineError> {
        let changes = self.workspace.change_set();
        if changes.is_empty() {
            debug!("nothing to commit");
            return Ok(CommitReceipt {
                upserted: 0,
                deleted: 0,
            });
        }
        prepare_commit(self.workspace.committed(), &changes).map_err(validation_error)?;
        let receipt = self.store.commit_changes(&changes).map_err(validation_error)?;

        let committed = self.store.load_index()?;
        self.workspace.reset(committed);
        self.log.clear();
        self.ripple = None;
        info!(upserted = receipt.upserted, deleted = receipt.deleted, "session committed");
        Ok(receipt)
    }

    /// Drop every pending change and the whole history.
    pub fn discard(&mut self) {
        self.workspace.discard_pending();
        self.log.clear();
        self.ripple = None;
        debug!("pending changes discarded");
    }
}

fn validation_error(e: StorageError) -> EngineError {
    match e {
        StorageError::Validation(report) => EngineError::Validation(report),
        other => other.into(),
    }
}
