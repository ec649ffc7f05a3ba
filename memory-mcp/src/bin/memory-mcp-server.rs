//! Entry point: load configuration, open the memory store, and run the
//! newline-delimited JSON-RPC loop over stdio. All logging goes to stderr —
//! stdout is reserved for JSON-RPC framing (spec.md §6).

use std::sync::Arc;

use memory_core::{MemoryStore, StoreConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = StoreConfig::load_default()?;
    config.validate()?;

    let tenant = std::env::var("MEMORY_TENANT").unwrap_or_else(|_| "default".to_string());
    info!(tenant = %tenant, "opening memory store");
    let store = Arc::new(MemoryStore::open(config, tenant).await?);
    info!(backend = ?store.backend_kind(), embedding_mode = ?store.embedding_mode(), "memory store ready");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    memory_mcp::server::run(stdin.lock(), stdout, store).await?;

    Ok(())
}
