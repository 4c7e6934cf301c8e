use tracing::warn;

use super::Command;
use crate::error::EngineError;
use crate::overlay::Workspace;

/// An ordered group of commands applied and reverted as one step.
#[derive(Debug)]
pub struct CompositeCommand {
    label: String,
    commands: Vec<Box<dyn Command>>,
}

impl CompositeCommand {
    pub fn new(label: impl Into<String>, commands: Vec<Box<dyn Command>>) -> Self {
        Self {
            label: label.into(),
            commands,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for CompositeCommand {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn execute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        for i in 0..self.commands.len() {
            if let Err(err) = self.commands[i].execute(workspace) {
                // Roll back the commands that already ran.
                for done in self.commands[..i].iter_mut().rev() {
                    if let Err(rollback) = done.unexecute(workspace) {
                        warn!(command = %done.label(), error = %rollback, "rollback failed");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn unexecute(&mut self, workspace: &mut Workspace) -> Result<(), EngineError> {
        let count = self.commands.len();
        for i in (0..count).rev() {
            if let Err(err) = self.commands[i].unexecute(workspace) {
                // Re-apply the ones already reverted; the group stays applied.
                for undone in self.commands[i + 1..].iter_mut() {
                    if let Err(reapply) = undone.execute(workspace) {
                        warn!(command = %undone.label(), error = %reapply, "re-apply failed");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}
