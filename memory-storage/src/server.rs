//! Remote libSQL/Turso backend. SQLite (and libSQL by extension) has no
//! native advisory-lock primitive, so the server backend emulates one with a
//! companion table: a row's presence under a hashed lock key *is* the lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use libsql::{Builder, Database};
use rand::RngExt;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, LockGuard, Row, Storage, Value};
use crate::error::{Result, StorageError};
use crate::schema;

const LOCK_POLL_ATTEMPTS: u32 = 50;
const LOCK_POLL_BASE: Duration = Duration::from_millis(20);
const LOCK_POLL_MAX: Duration = Duration::from_millis(500);

pub struct ServerBackend {
    db: Arc<Database>,
    holder: String,
}

impl ServerBackend {
    /// Connect to a remote libSQL/Turso database at `url` authenticated
    /// with `token`, and apply schema migrations idempotently.
    pub async fn connect(url: &str, token: &str) -> Result<Self> {
        info!(url, "connecting to remote memory store");
        let db = Builder::new_remote(url.to_string(), token.to_string())
            .build()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let backend = Self {
            db: Arc::new(db),
            holder: uuid::Uuid::new_v4().to_string(),
        };
        backend.init().await?;
        Ok(backend)
    }

    async fn init(&self) -> Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for stmt in schema::ALL_TABLES {
            conn.execute(stmt, ()).await.map_err(StorageError::Query)?;
        }
        for stmt in schema::ALL_TRIGGERS {
            conn.execute_batch(stmt).await.map_err(StorageError::Query)?;
        }
        debug!("server schema applied");
        Ok(())
    }
}

/// 32-bit FNV-1a hash, used only to keep the advisory lock key compact; a
/// collision merely serializes two unrelated locks against each other,
/// which is safe, just slower.
fn hash_lock_key(key: &str) -> i64 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    i64::from(hash)
}

#[async_trait]
impl Storage for ServerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Server
    }

    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows = conn.query(sql, params).await.map_err(StorageError::Query)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(StorageError::Query)? {
            out.push(row);
        }
        Ok(out)
    }

    async fn query_one(&self, sql: &str, params: Vec<Value>) -> Result<Option<Row>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    async fn exec(&self, sql: &str, params: Vec<Value>) -> Result<u64> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        conn.execute(sql, params).await.map_err(StorageError::Query)
    }

    async fn transaction(&self) -> Result<libsql::Transaction> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        conn.transaction().await.map_err(StorageError::Query)
    }

    async fn with_lock(&self, lock_key: &str) -> Result<LockGuard> {
        let hashed = hash_lock_key(lock_key);
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for attempt in 0..LOCK_POLL_ATTEMPTS {
            let inserted = conn
                .execute(
                    "INSERT INTO advisory_locks (lock_key, holder, acquired_at) \
                     VALUES (?1, ?2, unixepoch()) \
                     ON CONFLICT(lock_key) DO NOTHING",
                    vec![
                        Value::Integer(hashed),
                        Value::Text(self.holder.clone()),
                    ],
                )
                .await
                .map_err(StorageError::Query)?;

            if inserted > 0 {
                return Ok(LockGuard::Server {
                    db: self.db.clone(),
                    lock_key: hashed,
                });
            }

            let backoff = std::cmp::min(
                LOCK_POLL_BASE * 2u32.saturating_pow(attempt.min(8)),
                LOCK_POLL_MAX,
            );
            let jitter_ms = rand::rng().random_range(0..=backoff.as_millis() as u64 / 2);
            tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
        }

        warn!(lock_key, "advisory lock acquisition timed out");
        Err(StorageError::LockTimeout {
            key: lock_key.to_string(),
            attempts: LOCK_POLL_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_lock_key("upsert:proj"), hash_lock_key("upsert:proj"));
    }

    #[test]
    fn hash_distinguishes_keys() {
        assert_ne!(hash_lock_key("upsert:proj-a"), hash_lock_key("upsert:proj-b"));
    }
}
