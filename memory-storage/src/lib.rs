//! Storage layer for the self-learning memory store.
//!
//! Two construction modes share one `Storage` trait: [`EmbeddedBackend`]
//! opens a local libSQL file with WAL journaling and FTS5, and
//! [`ServerBackend`] talks to a remote libSQL/Turso database with
//! table-emulated advisory locks. `memory-core` depends only on the trait.

pub mod backend;
pub mod embedded;
pub mod error;
pub mod retry;
pub mod schema;
pub mod server;

pub use backend::{BackendKind, LockGuard, Row, Storage, Value};
pub use embedded::EmbeddedBackend;
pub use error::{Result, StorageError};
pub use server::ServerBackend;

use std::sync::Arc;
use tracing::warn;

/// Connect to `server_url` if given, falling back to the local file at
/// `embedded_path` on connection failure. Startup never fails solely
/// because the remote database is unreachable.
pub async fn open(
    server_url: Option<(&str, &str)>,
    embedded_path: &str,
) -> Result<Arc<dyn Storage>> {
    if let Some((url, token)) = server_url {
        match ServerBackend::connect(url, token).await {
            Ok(backend) => return Ok(Arc::new(backend)),
            Err(e) => {
                warn!(error = %e, "server backend unreachable, falling back to embedded");
            }
        }
    }
    Ok(Arc::new(EmbeddedBackend::open(embedded_path).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_falls_back_to_embedded_without_server_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memory.db");
        let storage = open(None, path.to_str().expect("utf8 path"))
            .await
            .expect("open embedded");
        assert_eq!(storage.kind(), BackendKind::Embedded);
    }

    #[tokio::test]
    async fn open_falls_back_on_bad_server_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memory.db");
        let storage = open(
            Some(("libsql://nonexistent.invalid", "bad-token")),
            path.to_str().expect("utf8 path"),
        )
        .await
        .expect("falls back instead of erroring");
        assert_eq!(storage.kind(), BackendKind::Embedded);
    }
}
