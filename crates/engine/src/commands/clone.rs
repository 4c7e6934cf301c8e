use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use templar_core::{
    AssetId, AssetIndex, EngineContext, UnmergedAsset, fqn,
    value::{PropertyMap, deep_merge},
};

use super::Command;
use crate::error::EngineError;
use crate::overlay::Workspace;

/// What a rebase hook can see about the clone in progress.
pub struct CloneScope<'a> {
    /// The live view the clone was taken from.
    pub live: &'a AssetIndex,
    /// Source fqn to clone fqn for every cloned asset.
    pub renames: &'a BTreeMap<String, String>,
}

impl CloneScope<'_> {
    /// True when `fqn` names one of the freshly cloned assets.
    pub fn is_clone(&self, fqn: &str) -> bool {
        self.renames.values().any(|cloned| cloned == fqn)
    }
}

/// Per-clone rewrite run after the structural copy.
pub type RebaseHook = Box<dyn Fn(&mut UnmergedAsset, &CloneScope<'_>)>;

/// Copy an asset and its whole subtree under a new parent.
///
/// Template references between members of the subtree are pointed at the
/// corresponding clones. The clone set is computed on first execution and
/// replayed verbatim on redo.
pub struct CloneAsset {
    source_id: AssetId,
    new_parent: Option<String>,
    new_key: String,
    hook: Option<RebaseHook>,
    produced: Vec<UnmergedAsset>,
}

impl fmt::Debug for CloneAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloneAsset")
            .field("source_id", &self.source_id)
            .field("new_parent", &self.new_parent)
            .field("new_key", &self.new_key)
            .field("hook", &self.hook.is_some())
            .field("produced", &self.produced.len())
            .finish()
    }
}

impl CloneAsset {
    pub fn new(
        source_id: AssetId,
        new_parent: Option<&str>,
        new_key: &str,
    ) -> Result<Self, EngineError> {
        fqn::validate_key(new_key)?;
        Ok(Self {
            source_id,
            new_parent: new_parent.map(str::to_string),
            new_key: new_key.to_string(),
            hook: None,
            produced: Vec::new(),
        })
    }

    pub fn with_hook(mut self, hook: RebaseHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn target_fqn(&self) -> String {
        fqn::join(self.new_parent.as_deref(), &self.new_key)
    }

    /// The cloned records, root first. Empty until the first execution.
    pub fn produced(&self) -> &[UnmergedAsset] {
        &self.produced
    }

    pub fn root_id(&self) -> Option<AssetId> {
        self.produced.first().map(|a| a.id)
    }

    fn plan(&self, live: &AssetIndex) -> Result<Vec<UnmergedAsset>, EngineError> {
        let source = live
            .get(self.source_id)
            .ok_or_else(|| EngineError::AssetNotFound(self.source_id.to_string()))?;

        let mut renames = BTreeMap::new();
        let mut clones = Vec::new();
        clone_subtree(source, &self.target_fqn(), live, &mut renames, &mut clones);

        for clone in &mut clones {
            if let Some(remapped) = clone
                .template_fqn
                .as_ref()
                .and_then(|template| renames.get(template))
            {
                clone.template_fqn = Some(remapped.clone());
            }
        }

        if let Some(hook) = &self.hook {
            let scope = CloneScope {
                live,
                renames: &renames,
            };
            for clone in &mut clones {
                hook(clone, &scope);
            }
        }
        Ok(clones)
    }
}

fn clone_subtree(
    source: &UnmergedAsset,
    target_fqn: &str,
    live: &AssetIndex,
    renames: &mut BTreeMap<String, String>,
    out: &mut Vec<UnmergedAsset>,
) {
    renames.insert(source.fqn.clone(), target_fqn.to_string());
    out.push(UnmergedAsset {
        id: AssetId::new(),
        ..source.with_fqn(target_fqn)
    });
    for child in live.children_of(&source.fqn) {
        let child_target = fqn::join(Some(target_fqn), &child.asset_key);
        clone_subtree(child, &child_target, live, renames, out);
    }
}

impl Command for CloneAsset {
    fn label(&self) -> String {
        format!("Clone to {}", self.target_fqn())
    }

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        if self.produced.is_empty() {
            self.produced = self.plan(&workspace.live_index())?;
        }
        if let Some(existing) = self.produced.iter().find(|a| workspace.live(a.id).is_some()) {
            return Err(EngineError::AssetExists(existing.fqn.clone()));
        }
        for clone in &self.produced {
            workspace.put(clone.clone());
        }
        Ok(())
    }

    fn unexecute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        if let Some(missing) = self
            .produced
            .iter()
            .find(|a| !workspace.pending().is_upserted(a.id))
        {
            return Err(EngineError::StaleCommand(missing.fqn.clone()));
        }
        for clone in &self.produced {
            workspace.take_upserted(clone.id);
        }
        Ok(())
    }
}

/// A hook that detaches clones from templates outside the cloned subtree
/// unless those templates are of a shareable type.
///
/// The external chain is walked until the first shareable asset; overrides of
/// every non-shareable asset passed on the way are folded beneath the clone's
/// own overrides and the clone is re-pointed at the shareable asset (or left
/// without a template when the chain has none).
pub fn rebase_onto_shareable(context: Arc<EngineContext>) -> RebaseHook {
    Box::new(move |clone: &mut UnmergedAsset, scope: &CloneScope<'_>| {
        let Some(template) = clone.template_fqn.clone() else {
            return;
        };
        if scope.is_clone(&template) {
            return;
        }

        let mut folded: Vec<&UnmergedAsset> = Vec::new();
        let mut anchor = None;
        let mut visited = BTreeSet::new();
        let mut next = Some(template);
        while let Some(current) = next.take() {
            if !visited.insert(current.clone()) {
                break;
            }
            let Some(asset) = scope.live.by_fqn(&current) else {
                // Dangling: keep pointing at the missing template.
                anchor = Some(current);
                break;
            };
            if context.types.is_shareable(asset.asset_type) {
                anchor = Some(asset.fqn.clone());
                break;
            }
            folded.push(asset);
            next = asset.template_fqn.clone();
        }

        if folded.is_empty() {
            return;
        }
        let mut overrides = PropertyMap::new();
        for ancestor in folded.iter().rev() {
            deep_merge(&mut overrides, &ancestor.overrides);
        }
        deep_merge(&mut overrides, &clone.overrides);
        clone.overrides = overrides;
        clone.template_fqn = anchor;
    })
}
