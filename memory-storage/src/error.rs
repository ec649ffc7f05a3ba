//! Storage-layer errors and the retryable-error classification the
//! per-project retry policy consults.

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(#[from] libsql::Error),

    #[error("lock timed out on key {key:?} after {attempts} attempts")]
    LockTimeout { key: String, attempts: u32 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("row missing expected column {0}")]
    MissingColumn(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Whether the operation that produced this error is worth retrying
    /// with backoff. Mirrors the set of transient SQLite/libSQL conditions
    /// the spec names: lock contention, busy, deadlock, serialization
    /// failure.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            StorageError::Query(libsql::Error::SqliteFailure(_, msg)) => {
                is_retryable_message(msg)
            }
            StorageError::Query(_) => false,
            StorageError::LockTimeout { .. } => true,
            StorageError::Connection(msg) => is_retryable_message(msg),
            StorageError::Serialization(_)
            | StorageError::MissingColumn(_)
            | StorageError::Configuration(_) => false,
        }
    }
}

fn is_retryable_message(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    ["database is locked", "busy", "deadlock", "could not serialize"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_is_recoverable() {
        let err = StorageError::LockTimeout {
            key: "upsert:proj".into(),
            attempts: 5,
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn missing_column_is_not_recoverable() {
        let err = StorageError::MissingColumn("title".into());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn retryable_message_detection_is_case_insensitive() {
        assert!(is_retryable_message("Database Is Locked"));
        assert!(is_retryable_message("SQLITE_BUSY: busy"));
        assert!(!is_retryable_message("no such table: memory_items"));
    }
}
