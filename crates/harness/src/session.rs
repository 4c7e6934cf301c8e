use std::sync::Arc;

use templar_core::{AssetId, EngineConfig, EngineContext, UnmergedAsset};
use templar_engine::{EditSession, EngineError, PendingChanges};
use templar_storage::{AssetStore, MemoryStore};

use crate::SeedSet;

/// An edit session wired to a store, plus the seed it was opened from.
pub struct TestSession<S: AssetStore = MemoryStore> {
    pub seed: SeedSet,
    pub session: EditSession<S>,
}

impl TestSession<MemoryStore> {
    pub fn new(seed: SeedSet) -> Result<Self, EngineError> {
        Self::with_context(seed, EngineContext::default())
    }

    pub fn with_context(seed: SeedSet, context: EngineContext) -> Result<Self, EngineError> {
        let store = seed.memory_store();
        Self::open(seed, Arc::new(context), store)
    }

    pub fn with_config(seed: SeedSet, toml: &str) -> Result<Self, EngineError> {
        let config = EngineConfig::from_toml_str(toml)?;
        Self::with_context(seed, EngineContext::from_config(&config)?)
    }
}

impl<S: AssetStore> TestSession<S> {
    pub fn open(seed: SeedSet, context: Arc<EngineContext>, store: S) -> Result<Self, EngineError> {
        Ok(Self {
            session: EditSession::open(context, store)?,
            seed,
        })
    }

    /// Seeded id for `fqn`.
    pub fn id(&self, fqn: &str) -> AssetId {
        self.seed.id(fqn)
    }

    /// Live asset currently at `fqn`, if any.
    pub fn live_by_fqn(&self, fqn: &str) -> Option<UnmergedAsset> {
        self.session.workspace().live_index().by_fqn(fqn).cloned()
    }

    pub fn live_fqn(&self, id: AssetId) -> Option<String> {
        self.session.live_asset(id).map(|a| a.fqn.clone())
    }

    /// Copy of the overlay, for exact before/after comparisons.
    pub fn snapshot(&self) -> PendingChanges {
        self.session.workspace().pending().clone()
    }

    /// Undo until the stack is empty. Returns how many steps were undone.
    pub fn undo_all(&mut self) -> Result<usize, EngineError> {
        let mut steps = 0;
        while self.session.can_undo() {
            self.session.undo()?;
            steps += 1;
        }
        Ok(steps)
    }

    pub fn redo_all(&mut self) -> Result<usize, EngineError> {
        let mut steps = 0;
        while self.session.can_redo() {
            self.session.redo()?;
            steps += 1;
        }
        Ok(steps)
    }
}
