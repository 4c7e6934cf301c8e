use templar_core::ValidationReport;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("checksum mismatch for asset {asset_id}")]
    ChecksumMismatch { asset_id: String },

    #[error("commit rejected: {0}")]
    Validation(ValidationReport),

    #[error("core error: {0}")]
    Core(#[from] templar_core::CoreError),
}
