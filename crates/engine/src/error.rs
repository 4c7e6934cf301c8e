use templar_core::{AssetType, CoreError, ValidationReport};
use templar_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("asset already exists: {0}")]
    AssetExists(String),

    #[error("fqn already in use: {0}")]
    FqnTaken(String),

    #[error("cannot move {fqn} beneath itself")]
    MoveIntoSelf { fqn: String },

    #[error("cannot place {child_type} under {parent}: {reason}")]
    PlacementDenied {
        parent: String,
        child_type: AssetType,
        reason: String,
    },

    #[error("asset {0} changed since the command was recorded")]
    StaleCommand(String),

    #[error("commit rejected: {0}")]
    Validation(ValidationReport),
}
