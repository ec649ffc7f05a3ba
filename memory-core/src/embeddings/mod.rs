//! Embedding generation for memory items.
//!
//! The embedding backend is a three-way variant: `local` (deterministic,
//! in-process, always available), `remote` (an OpenAI-compatible HTTP
//! embeddings endpoint, gated behind the `openai` feature and wrapped in a
//! circuit breaker so a flaky endpoint degrades to keyword-only search
//! instead of stalling every upsert), and `disabled` (vector search is
//! skipped entirely; ranking falls back to keyword + recency).

pub mod circuit_breaker;
pub mod config;
pub mod local;
#[cfg(feature = "openai")]
pub mod openai;
pub mod provider;
pub mod similarity;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpenError};
pub use config::ModelConfig;
pub use local::LocalEmbeddingProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult};
pub use similarity::cosine_similarity;

use std::sync::Arc;

use tracing::warn;

/// Default embedding dimension used by the local provider and by any
/// caller that does not override it via configuration.
pub const DEFAULT_EMBEDDING_DIM: usize = 256;

/// Which embedding backend is active. Carried in the forensic metadata
/// block on every response so a caller can tell whether a search used real
/// semantic similarity or fell back to local hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    Local,
    Remote,
    Disabled,
}

/// Coordinates embedding generation with circuit-breaker-guarded fallback:
/// try the remote provider if configured, fall back to local hashing on
/// repeated remote failure, and support disabling vector generation
/// entirely.
pub struct EmbeddingBackend {
    mode: EmbeddingMode,
    remote: Option<Arc<dyn EmbeddingProvider>>,
    local: Arc<dyn EmbeddingProvider>,
    breaker: CircuitBreaker,
}

impl EmbeddingBackend {
    #[must_use]
    pub fn disabled() -> Self {
        let local = Arc::new(BlockingLocalStub);
        Self {
            mode: EmbeddingMode::Disabled,
            remote: None,
            local,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    pub async fn local_only(dimension: usize) -> anyhow::Result<Self> {
        let local = Arc::new(LocalEmbeddingProvider::new(ModelConfig::local_default(dimension)).await?);
        Ok(Self {
            mode: EmbeddingMode::Local,
            remote: None,
            local,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        })
    }

    #[cfg(feature = "openai")]
    pub async fn with_remote(
        dimension: usize,
        remote: Arc<dyn EmbeddingProvider>,
    ) -> anyhow::Result<Self> {
        let local = Arc::new(LocalEmbeddingProvider::new(ModelConfig::local_default(dimension)).await?);
        Ok(Self {
            mode: EmbeddingMode::Remote,
            remote: Some(remote),
            local,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        })
    }

    #[must_use]
    pub fn mode(&self) -> EmbeddingMode {
        self.mode
    }

    /// Distinct model names backing this instance — the local provider
    /// always, plus the remote provider when configured. Surfaced in
    /// forensic metadata's `cross_model.models` so a caller can tell
    /// whether items in a project were embedded by more than one model.
    #[must_use]
    pub fn model_names(&self) -> Vec<String> {
        let mut names = vec![self.local.model_name().to_string()];
        if let Some(remote) = &self.remote {
            names.push(remote.model_name().to_string());
        }
        names
    }

    /// Generate an embedding for `text`, discarding the fallback reason.
    /// Callers that need to surface degraded-mode information to a caller
    /// (e.g. `MemoryStore::search`) should use [`Self::embed_with_outcome`]
    /// instead.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.embed_with_outcome(text).await.vector
    }

    /// Generate an embedding for `text`, reporting why vector search would
    /// be degraded for this call if it is. A remote failure never returns
    /// an error to the caller: it trips the breaker and falls back to the
    /// local provider, logged at `warn`, and the fallback is also reported
    /// in `fallback_reason` so a caller can surface it to the requester.
    pub async fn embed_with_outcome(&self, text: &str) -> EmbedOutcome {
        if self.mode == EmbeddingMode::Disabled {
            return EmbedOutcome {
                vector: None,
                fallback_reason: Some("embedding backend disabled".to_string()),
            };
        }

        if let Some(remote) = &self.remote {
            if self.breaker.allow_request().is_ok() {
                match remote.embed_text(text).await {
                    Ok(vector) => {
                        self.breaker.record_success();
                        return EmbedOutcome { vector: Some(vector), fallback_reason: None };
                    }
                    Err(e) => {
                        self.breaker.record_failure();
                        warn!(error = %e, "remote embedding failed, falling back to local");
                        return EmbedOutcome {
                            vector: self.local.embed_text(text).await.ok(),
                            fallback_reason: Some(format!("remote embedding error, fell back to local: {e}")),
                        };
                    }
                }
            }
            return EmbedOutcome {
                vector: self.local.embed_text(text).await.ok(),
                fallback_reason: Some("embedding circuit breaker open, fell back to local".to_string()),
            };
        }

        EmbedOutcome { vector: self.local.embed_text(text).await.ok(), fallback_reason: None }
    }
}

/// Result of an embedding attempt: the vector (if one was produced) plus a
/// reason when the caller's intended backend was not the one actually used.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub vector: Option<Vec<f32>>,
    pub fallback_reason: Option<String>,
}

/// A provider that is never called: `EmbeddingBackend::disabled` needs a
/// placeholder to satisfy the field type, but `embed` short-circuits before
/// touching it.
struct BlockingLocalStub;

#[async_trait::async_trait]
impl EmbeddingProvider for BlockingLocalStub {
    async fn embed_text(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding backend is disabled")
    }

    fn embedding_dimension(&self) -> usize {
        0
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

/// Build the front-loaded embedding input for a memory item: the fields
/// that matter most for retrieval go first, since some providers truncate
/// long inputs, and a truncated tail should cost us tags/outcome before it
/// costs us the title.
#[must_use]
pub fn front_loaded_input(
    title: &str,
    tags: &[String],
    outcome: Option<&str>,
    command: Option<&str>,
    content: &str,
    max_content_chars: usize,
) -> String {
    let mut parts = vec![format!("TITLE: {title}")];
    if !tags.is_empty() {
        parts.push(format!("TAGS: {}", tags.join(", ")));
    }
    if let Some(outcome) = outcome {
        parts.push(format!("OUTCOME: {outcome}"));
    }
    if let Some(command) = command {
        parts.push(format!("CMD: {command}"));
    }
    let truncated: String = content.chars().take(max_content_chars).collect();
    parts.push(truncated);
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_backend_returns_none() {
        let backend = EmbeddingBackend::disabled();
        assert_eq!(backend.mode(), EmbeddingMode::Disabled);
        assert!(backend.embed("anything").await.is_none());
    }

    #[tokio::test]
    async fn disabled_backend_reports_a_fallback_reason() {
        let backend = EmbeddingBackend::disabled();
        let outcome = backend.embed_with_outcome("anything").await;
        assert!(outcome.vector.is_none());
        assert!(outcome.fallback_reason.is_some());
    }

    #[tokio::test]
    async fn local_only_backend_embeds() {
        let backend = EmbeddingBackend::local_only(64).await.unwrap();
        let v = backend.embed("hello world").await.unwrap();
        assert_eq!(v.len(), 64);
    }

    #[test]
    fn front_loaded_input_puts_title_first() {
        let input = front_loaded_input(
            "Fix deploy",
            &["ops".to_string()],
            Some("success"),
            Some("cargo build"),
            "a very long body of content describing the fix",
            20,
        );
        assert!(input.starts_with("TITLE: Fix deploy"));
        assert!(input.contains("TAGS: ops"));
        assert!(input.contains("OUTCOME: success"));
        assert!(input.contains("CMD: cargo build"));
    }

    #[test]
    fn front_loaded_input_truncates_content() {
        let input = front_loaded_input("T", &[], None, None, &"x".repeat(1000), 10);
        let last_line = input.lines().last().unwrap();
        assert_eq!(last_line.len(), 10);
    }
}
