#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Memory Core
//!
//! The engine behind a persistent, auditable memory store for AI agents:
//! typed items (`fact`, `state`, `decision`, `runbook`, `episode`), a
//! four-gate upsert pipeline that collapses duplicates, a hybrid
//! keyword/vector/recency ranker, a knowledge graph of typed links between
//! items, and a governance layer (lifecycle transitions, feedback,
//! loop-breaker guardrails, maintenance).
//!
//! ## Module organization
//!
//! - [`types`]: the data model (`MemoryItem` and its satellite tables).
//! - [`store`]: [`store::MemoryStore`], the top-level handle bundling
//!   storage, cache, and embeddings.
//! - [`upsert`]: the four-gate write pipeline.
//! - [`index`]: keyword (FTS5/BM25) and vector (cosine) search.
//! - [`ranker`]: hybrid scoring and diversification.
//! - [`graph`]: typed links between items and relation suggestion.
//! - [`governance`]: lifecycle, feedback, pruning, conflict detection,
//!   loop-breaker/guardrails.
//! - [`maintain`]: the fixed fourteen-action maintenance pipeline.
//! - [`embeddings`]: the local/remote/disabled embedding backend.
//! - [`config`]: TOML configuration with environment overrides.
//! - [`cache`]: the LRU item cache.
//! - [`retry`]: linear-backoff retry policy for embedding calls.
//! - [`error`]: the crate's error type.
//!
//! ## Quick start
//!
//! ```no_run
//! use memory_core::config::StoreConfig;
//! use memory_core::store::MemoryStore;
//! use memory_core::upsert::ProposedItem;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = StoreConfig::load_default()?;
//! let store = MemoryStore::open(config, "default-tenant").await?;
//!
//! let report = store
//!     .upsert(vec![ProposedItem {
//!         kind: memory_core::types::ItemKind::Fact,
//!         project: "demo".into(),
//!         title: "Use cargo nextest for CI".into(),
//!         content: "cargo nextest run is faster than cargo test in CI".into(),
//!         tags: vec!["ci".into()],
//!         verified: false,
//!         confidence: 0.8,
//!         provenance: serde_json::json!({}),
//!         success: None,
//!         source: memory_core::types::Source::Agent,
//!     }])
//!     .await?;
//! println!("{:?}", report.results);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod governance;
pub mod graph;
pub mod hashing;
pub mod index;
pub mod maintain;
pub mod ranker;
pub mod retry;
pub mod row;
pub mod store;
pub mod time;
pub mod types;
pub mod upsert;

pub use config::StoreConfig;
pub use embeddings::EmbeddingMode;
pub use error::{Error, Result};
pub use memory_storage::BackendKind;
pub use store::{GovernanceSnapshot, MemoryStore};
pub use types::{ItemKind, ItemStatus, MemoryItem, Relation, Source};
