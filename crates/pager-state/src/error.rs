//! Error types for the pager storage layer.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict on {key}: resource version {expected} does not match {actual}")]
    Conflict {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("storage options: {0}")]
    Options(String),

    #[error("scheme error: {0}")]
    Scheme(#[from] pager_core::SchemeError),

    #[error(transparent)]
    Selector(#[from] pager_core::SelectorError),
}
