//! Cascading consequences of changing an asset's fqn.
//!
//! Moving or renaming an asset drags along its descendants (their fqns embed
//! the old one), every asset that names it as a template, and any shadow
//! children of the same key under assets inheriting from its parent.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use templar_core::{AssetId, AssetIndex, UnmergedAsset, fqn};

use crate::commands::{Command, CompositeCommand, UpdateAsset};
use crate::error::EngineError;
use crate::overlay::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FqnUpdate {
    pub id: AssetId,
    pub old_fqn: String,
    pub new_fqn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLinkUpdate {
    pub id: AssetId,
    pub fqn: String,
    pub old_template: String,
    pub new_template: String,
}

/// Dry-run result of an fqn change: everything that has to move with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefactorConsequences {
    pub target: AssetId,
    pub old_fqn: String,
    pub old_key: String,
    pub new_fqn: String,
    pub new_key: String,
    pub descendant_updates: Vec<FqnUpdate>,
    pub template_link_updates: Vec<TemplateLinkUpdate>,
    pub shadow_updates: Vec<FqnUpdate>,
}

impl RefactorConsequences {
    /// True when nothing beyond the target itself changes.
    pub fn is_trivial(&self) -> bool {
        self.descendant_updates.is_empty()
            && self.template_link_updates.is_empty()
            && self.shadow_updates.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.old_fqn == self.new_fqn
    }

    pub fn is_rename(&self) -> bool {
        fqn::parent(&self.old_fqn) == fqn::parent(&self.new_fqn)
    }

    /// Every asset id whose record changes, target included.
    pub fn affected_ids(&self) -> Vec<AssetId> {
        let mut ids = vec![self.target];
        ids.extend(self.descendant_updates.iter().map(|u| u.id));
        ids.extend(self.template_link_updates.iter().map(|u| u.id));
        ids.extend(self.shadow_updates.iter().map(|u| u.id));
        ids.sort();
        ids.dedup();
        ids
    }

    /// The final record for every affected asset, paired with its current one.
    pub fn planned_records(
        &self,
        live: &AssetIndex,
    ) -> Result<Vec<(UnmergedAsset, UnmergedAsset)>, EngineError> {
        let mut planned: BTreeMap<AssetId, UnmergedAsset> = BTreeMap::new();
        let current = |id: AssetId,
                       planned: &mut BTreeMap<AssetId, UnmergedAsset>|
         -> Result<UnmergedAsset, EngineError> {
            match planned.remove(&id) {
                Some(record) => Ok(record),
                None => live
                    .get(id)
                    .cloned()
                    .ok_or_else(|| EngineError::AssetNotFound(id.to_string())),
            }
        };

        let target = current(self.target, &mut planned)?;
        planned.insert(self.target, target.with_fqn(&self.new_fqn));

        for update in self.descendant_updates.iter().chain(&self.shadow_updates) {
            let record = current(update.id, &mut planned)?;
            planned.insert(update.id, record.with_fqn(&update.new_fqn));
        }
        for update in &self.template_link_updates {
            let record = current(update.id, &mut planned)?;
            planned.insert(update.id, record.with_template(Some(&update.new_template)));
        }

        planned
            .into_values()
            .map(|new| -> Result<_, EngineError> {
                let old = live
                    .get(new.id)
                    .cloned()
                    .ok_or_else(|| EngineError::AssetNotFound(new.id.to_string()))?;
                Ok((old, new))
            })
            .filter(|pair| !matches!(pair, Ok((old, new)) if old == new))
            .collect()
    }
}

/// Work out everything that must change if asset `id` moves to `new_fqn`.
/// Reads `live` only.
pub fn calculate(
    live: &AssetIndex,
    id: AssetId,
    new_fqn: &str,
) -> Result<RefactorConsequences, EngineError> {
    fqn::validate(new_fqn)?;
    let target = live
        .get(id)
        .ok_or_else(|| EngineError::AssetNotFound(id.to_string()))?;
    let old_fqn = target.fqn.clone();
    let old_key = target.asset_key.clone();
    let new_key = fqn::key(new_fqn).to_string();

    let mut consequences = RefactorConsequences {
        target: id,
        old_fqn: old_fqn.clone(),
        old_key: old_key.clone(),
        new_fqn: new_fqn.to_string(),
        new_key: new_key.clone(),
        descendant_updates: Vec::new(),
        template_link_updates: Vec::new(),
        shadow_updates: Vec::new(),
    };
    if old_fqn == new_fqn {
        return Ok(consequences);
    }
    if fqn::is_descendant_of(new_fqn, &old_fqn) {
        return Err(EngineError::MoveIntoSelf { fqn: old_fqn });
    }
    if live.by_fqn(new_fqn).is_some_and(|other| other.id != id) {
        return Err(EngineError::FqnTaken(new_fqn.to_string()));
    }

    // Descendants: exact prefix swap.
    let descendants = live.descendants_of(&old_fqn);
    for descendant in &descendants {
        if let Some(rebased) = fqn::rebase(&descendant.fqn, &old_fqn, new_fqn) {
            consequences.descendant_updates.push(FqnUpdate {
                id: descendant.id,
                old_fqn: descendant.fqn.clone(),
                new_fqn: rebased,
            });
        }
    }

    // Template links to the target or to anything beneath it.
    consequences
        .template_link_updates
        .extend(link_updates(live, &old_fqn, new_fqn));

    // Shadow children: only a rename in place has a key to follow.
    if consequences.is_rename()
        && let Some(parent_fqn) = fqn::parent(&old_fqn)
    {
        for inheritor in live.dependents_of(parent_fqn) {
            let shadow_fqn = fqn::join(Some(&inheritor.fqn), &old_key);
            let Some(shadow) = live.by_fqn(&shadow_fqn) else {
                continue;
            };
            // Shadows inside the target's own subtree already move with it.
            if shadow.id == id || fqn::is_descendant_of(&shadow_fqn, &old_fqn) {
                continue;
            }
            let renamed_fqn = fqn::join(Some(&inheritor.fqn), &new_key);
            if live.contains_fqn(&renamed_fqn) {
                warn!(
                    shadow = %shadow_fqn,
                    target = %renamed_fqn,
                    "shadow rename skipped: fqn in use"
                );
                continue;
            }
            consequences.shadow_updates.push(FqnUpdate {
                id: shadow.id,
                old_fqn: shadow_fqn.clone(),
                new_fqn: renamed_fqn.clone(),
            });
            for nested in live.descendants_of(&shadow_fqn) {
                if let Some(rebased) = fqn::rebase(&nested.fqn, &shadow_fqn, &renamed_fqn) {
                    consequences.shadow_updates.push(FqnUpdate {
                        id: nested.id,
                        old_fqn: nested.fqn.clone(),
                        new_fqn: rebased,
                    });
                }
            }
            consequences
                .template_link_updates
                .extend(link_updates(live, &shadow_fqn, &renamed_fqn));
        }
    }

    debug!(
        old = %consequences.old_fqn,
        new = %consequences.new_fqn,
        descendants = consequences.descendant_updates.len(),
        template_links = consequences.template_link_updates.len(),
        shadows = consequences.shadow_updates.len(),
        "refactor consequences calculated"
    );
    Ok(consequences)
}

/// Template references to `from` or beneath it, rewritten under `to`.
/// Ordered by the referencing asset's fqn.
fn link_updates(live: &AssetIndex, from: &str, to: &str) -> Vec<TemplateLinkUpdate> {
    let mut updates: Vec<TemplateLinkUpdate> = live
        .iter()
        .filter_map(|asset| {
            let template = asset.template_fqn.as_deref()?;
            let rebased = fqn::rebase(template, from, to)?;
            Some(TemplateLinkUpdate {
                id: asset.id,
                fqn: asset.fqn.clone(),
                old_template: template.to_string(),
                new_template: rebased,
            })
        })
        .collect();
    updates.sort_by(|a, b| a.fqn.cmp(&b.fqn));
    updates
}

/// Applies a primary fqn change and all of its consequences as one undo step.
#[derive(Debug)]
pub struct ApplyRefactoring {
    consequences: RefactorConsequences,
    updates: CompositeCommand,
}

impl ApplyRefactoring {
    pub fn new(live: &AssetIndex, consequences: RefactorConsequences) -> Result<Self, EngineError> {
        let label = format!("Rename {} to {}", consequences.old_fqn, consequences.new_fqn);
        let commands = consequences
            .planned_records(live)?
            .into_iter()
            .map(|(old, new)| {
                UpdateAsset::new(old, new).map(|c| Box::new(c) as Box<dyn Command>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            consequences,
            updates: CompositeCommand::new(label, commands),
        })
    }

    pub fn consequences(&self) -> &RefactorConsequences {
        &self.consequences
    }
}

impl Command for ApplyRefactoring {
    fn label(&self) -> String {
        self.updates.label()
    }

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        self.updates.execute(workspace)
    }

    fn unexecute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        self.updates.unexecute(workspace)
    }
}
