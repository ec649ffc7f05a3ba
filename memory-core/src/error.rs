//! Typed domain errors for the memory engine, with an `is_recoverable`
//! predicate the retry policy consults before retrying a failed operation.

use uuid::Uuid;

/// Result type alias used throughout `memory-core`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("item not found: {0}")]
    NotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    Embedding(#[from] anyhow::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid state transition: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
}

impl Error {
    /// Whether this error is worth retrying with backoff. Storage and
    /// embedding errors propagate a backend's own classification; the rest
    /// are programmer or caller errors that retrying cannot fix.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Embedding(_) | Error::LockFailed(_))
    }
}

impl From<memory_storage::StorageError> for Error {
    fn from(err: memory_storage::StorageError) -> Self {
        if matches!(err, memory_storage::StorageError::LockTimeout { .. }) {
            Error::LockFailed(err.to_string())
        } else {
            Error::Storage(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_recoverable() {
        assert!(Error::Storage("database is locked".into()).is_recoverable());
    }

    #[test]
    fn validation_errors_are_not_recoverable() {
        assert!(!Error::ValidationFailed("missing title".into()).is_recoverable());
    }

    #[test]
    fn not_found_is_not_recoverable() {
        assert!(!Error::NotFound(Uuid::nil()).is_recoverable());
    }
}
