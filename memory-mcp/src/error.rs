//! Error types for the MCP transport layer. Tool-level failures never
//! reach this type — they are folded into a tool result with
//! `isError: true` (spec.md §7); this type covers only transport and
//! server-startup failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed JSON-RPC request: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Core(#[from] memory_core::Error),
}
