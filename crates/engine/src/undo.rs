use std::collections::VecDeque;

use crate::commands::Command;

/// Linear undo/redo history of executed commands.
pub struct CommandLog {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_depth: usize,
}

impl CommandLog {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    pub fn push_undo(&mut self, command: Box<dyn Command>) {
        self.undo_stack.push_back(command);
        // Enforce depth limit by dropping oldest entry
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    pub fn pop_undo(&mut self) -> Option<Box<dyn Command>> {
        self.undo_stack.pop_back()
    }

    pub fn push_redo(&mut self, command: Box<dyn Command>) {
        self.redo_stack.push(command);
    }

    pub fn pop_redo(&mut self) -> Option<Box<dyn Command>> {
        self.redo_stack.pop()
    }

    pub fn clear_redo(&mut self) {
        self.redo_stack.clear();
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_label(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.label())
    }

    pub fn redo_label(&self) -> Option<String> {
        self.redo_stack.last().map(|c| c.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::overlay::Workspace;

    #[derive(Debug)]
    struct Noop(&'static str);

    impl Command for Noop {
        fn label(&self) -> String {
            self.0.to_string()
        }

        fn execute(&mut self, _: &mut Workspace) -> Result<(), EngineError> {
            Ok(())
        }

        fn unexecute(&mut self, _: &mut Workspace) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn depth_limit_drops_oldest() {
        let mut log = CommandLog::new(2);
        log.push_undo(Box::new(Noop("one")));
        log.push_undo(Box::new(Noop("two")));
        log.push_undo(Box::new(Noop("three")));
        assert_eq!(log.undo_depth(), 2);
        assert_eq!(log.undo_label().as_deref(), Some("three"));
        log.pop_undo();
        assert_eq!(log.undo_label().as_deref(), Some("two"));
        log.pop_undo();
        assert!(log.pop_undo().is_none());
    }

    #[test]
    fn redo_stack_is_lifo() {
        let mut log = CommandLog::new(10);
        log.push_redo(Box::new(Noop("a")));
        log.push_redo(Box::new(Noop("b")));
        assert_eq!(log.redo_label().as_deref(), Some("b"));
        log.clear_redo();
        assert_eq!(log.redo_depth(), 0);
    }
}
