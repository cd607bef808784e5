use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// Unique key collision.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Foreign key points at a row that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersion { expected: i32, found: i32 },

    #[error("backend error: {0}")]
    Backend(String),
}
