//! Reversible edits against a [`Workspace`].
//!
//! `execute` either applies its whole mutation or returns an error having
//! changed nothing; `unexecute` restores exactly the state `execute` found.

mod clone;
mod composite;
mod create;
mod delete;
mod derive;
mod update;

use std::fmt;

pub use clone::{CloneAsset, CloneScope, RebaseHook, rebase_onto_shareable};
pub use composite::CompositeCommand;
pub use create::CreateAsset;
pub use delete::DeleteAssets;
pub use derive::DeriveAsset;
pub use update::UpdateAsset;

use crate::error::EngineError;
use crate::overlay::Workspace;

pub trait Command: fmt::Debug {
    /// Short description for undo/redo menus and logs.
    fn label(&self) -> String;

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError>;

    fn unexecute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError>;
}
