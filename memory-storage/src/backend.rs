//! The storage-backend trait. `memory-core` depends only on this trait, not
//! on libSQL or on which backend is active.

use async_trait::async_trait;

use crate::error::Result;

pub type Value = libsql::Value;
pub type Row = libsql::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedded,
    Server,
}

/// RAII handle for a held lock. Dropping it releases the lock; embedded
/// backends hold no lock state of their own (SQLite already serializes
/// writers at the file level), so their guard is a no-op.
pub enum LockGuard {
    Embedded,
    Server {
        db: std::sync::Arc<libsql::Database>,
        lock_key: i64,
    },
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let LockGuard::Server { db, lock_key } = self {
            let db = db.clone();
            let lock_key = *lock_key;
            tokio::spawn(async move {
                if let Ok(conn) = db.connect() {
                    let _ = conn
                        .execute(
                            "DELETE FROM advisory_locks WHERE lock_key = ?1",
                            vec![Value::Integer(lock_key)],
                        )
                        .await;
                }
            });
        }
    }
}

/// Storage abstraction shared by the embedded and server backends.
///
/// `memory-core` issues plain SQL through this trait; it never sees a
/// `libsql::Connection` directly, so swapping the backend at startup (or
/// falling back from server to embedded on connection failure) needs no
/// changes above this layer.
#[async_trait]
pub trait Storage: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>>;

    async fn query_one(&self, sql: &str, params: Vec<Value>) -> Result<Option<Row>>;

    async fn exec(&self, sql: &str, params: Vec<Value>) -> Result<u64>;

    /// Begin a libSQL transaction. Callers are responsible for calling
    /// `commit()` or `rollback()`; an unfinished transaction rolls back
    /// when dropped, per libSQL's own `Drop` impl.
    async fn transaction(&self) -> Result<libsql::Transaction>;

    /// Acquire a named lock. The embedded backend returns immediately
    /// (SQLite's own writer serialization covers it); the server backend
    /// rows-lock an `advisory_locks` table keyed by `lock_key`, polling
    /// with backoff until it is free or `max_wait` attempts are exhausted.
    async fn with_lock(&self, lock_key: &str) -> Result<LockGuard>;
}
