//! Local-file backend: a single libSQL database on disk, WAL journaling, a
//! generous busy timeout, and the FTS5 virtual table.

use async_trait::async_trait;
use libsql::{Builder, Database};
use tracing::{debug, info};

use crate::backend::{BackendKind, LockGuard, Row, Storage, Value};
use crate::error::{Result, StorageError};
use crate::schema;

pub struct EmbeddedBackend {
    db: Database,
}

impl EmbeddedBackend {
    /// Open (creating if absent) a local database file at `path` and apply
    /// schema migrations idempotently.
    pub async fn open(path: &str) -> Result<Self> {
        info!(path, "opening embedded memory store");
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let backend = Self { db };
        backend.init().await?;
        Ok(backend)
    }

    /// Open an in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let backend = Self { db };
        backend.init().await?;
        Ok(backend)
    }

    async fn init(&self) -> Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        conn.query("PRAGMA journal_mode = WAL", ())
            .await
            .map_err(StorageError::Query)?;
        conn.query("PRAGMA busy_timeout = 30000", ())
            .await
            .map_err(StorageError::Query)?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(StorageError::Query)?;

        for stmt in schema::ALL_TABLES {
            conn.execute(stmt, ()).await.map_err(StorageError::Query)?;
        }
        for stmt in schema::ALL_TRIGGERS {
            conn.execute_batch(stmt).await.map_err(StorageError::Query)?;
        }

        debug!("embedded schema applied");
        Ok(())
    }

    /// Truncate the write-ahead log. Invoked by the `wal_checkpoint`
    /// maintenance action.
    pub async fn checkpoint(&self) -> Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        conn.query("PRAGMA wal_checkpoint(TRUNCATE)", ())
            .await
            .map_err(StorageError::Query)?;
        Ok(())
    }

    pub async fn vacuum(&self) -> Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        conn.execute("VACUUM", ()).await.map_err(StorageError::Query)?;
        Ok(())
    }
}

#[async_trait]
impl Storage for EmbeddedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
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
        // SQLite's own writer serialization (WAL + busy_timeout) already
        // gives us mutual exclusion on mutating statements; the in-process
        // per-project lock in memory-core covers the rest.
        debug!(lock_key, "embedded backend: no-op lock");
        Ok(LockGuard::Embedded)
    }
}
