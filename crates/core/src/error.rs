use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid fqn: {0}")]
    InvalidFqn(String),

    #[error("invalid asset key: {0}")]
    InvalidKey(String),

    #[error("asset key {key:?} does not match fqn {fqn:?}")]
    KeyMismatch { fqn: String, key: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
