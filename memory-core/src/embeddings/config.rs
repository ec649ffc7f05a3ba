//! Embedding model configuration shared by the local and remote providers.

use serde::{Deserialize, Serialize};

/// Tunables governing HTTP retry/backoff and batching for a remote provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub connection_pool_size: usize,
    pub timeout_seconds: u64,
    pub max_batch_size: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 200,
            connection_pool_size: 8,
            timeout_seconds: 30,
            max_batch_size: 96,
        }
    }
}

impl OptimizationConfig {
    #[must_use]
    pub fn get_timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    #[must_use]
    pub fn get_max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub embedding_dimension: usize,
    pub base_url: Option<String>,
    pub optimization: OptimizationConfig,
}

impl ModelConfig {
    #[must_use]
    pub fn get_embeddings_url(&self) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        format!("{base}/embeddings")
    }

    #[must_use]
    pub fn openai_3_small() -> Self {
        Self {
            model_name: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            base_url: None,
            optimization: OptimizationConfig::default(),
        }
    }

    #[must_use]
    pub fn openai_3_large() -> Self {
        Self {
            model_name: "text-embedding-3-large".to_string(),
            embedding_dimension: 3072,
            base_url: None,
            optimization: OptimizationConfig::default(),
        }
    }

    #[must_use]
    pub fn openai_ada_002() -> Self {
        Self {
            model_name: "text-embedding-ada-002".to_string(),
            embedding_dimension: 1536,
            base_url: None,
            optimization: OptimizationConfig::default(),
        }
    }

    #[must_use]
    pub fn local_default(dimension: usize) -> Self {
        Self {
            model_name: "local-deterministic-hash".to_string(),
            embedding_dimension: dimension,
            base_url: None,
            optimization: OptimizationConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::local_default(crate::embeddings::DEFAULT_EMBEDDING_DIM)
    }
}
