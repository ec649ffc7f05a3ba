//! Local, in-process embedding provider.
//!
//! Produces a deterministic fixed-width vector from text without any model
//! file or network call, by hashing overlapping word shingles into buckets
//! and normalizing. It is not semantically rich, but it is always
//! available, has zero latency, and gives the hybrid ranker a vector signal
//! to blend with keyword search even when no API key is configured — this
//! is the `local` variant of the embedding backend; the `remote` variant
//! (`openai`) and `disabled` variant are the other two.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::Result;
use async_trait::async_trait;

use super::config::ModelConfig;
use super::provider::{utils, EmbeddingProvider};

pub struct LocalEmbeddingProvider {
    config: ModelConfig,
}

impl LocalEmbeddingProvider {
    /// Construct a provider with the given dimension. Never fails: there is
    /// no model to load.
    pub async fn new(config: ModelConfig) -> Result<Self> {
        Ok(Self { config })
    }

    fn shingles(text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() < 2 {
            return words.iter().map(|w| w.to_lowercase()).collect();
        }
        words
            .windows(2)
            .map(|pair| format!("{} {}", pair[0].to_lowercase(), pair[1].to_lowercase()))
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let dim = self.config.embedding_dimension;
        let mut vector = vec![0.0f32; dim];

        for shingle in Self::shingles(text) {
            let mut hasher = DefaultHasher::new();
            shingle.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash as usize) % dim;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        Ok(utils::normalize_vector(vector))
    }

    fn embedding_dimension(&self) -> usize {
        self.config.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model_name(),
            "dimension": self.embedding_dimension(),
            "type": "local",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let provider = LocalEmbeddingProvider::new(ModelConfig::local_default(128))
            .await
            .unwrap();
        let a = provider.embed_text("fix the auth bug").await.unwrap();
        let b = provider.embed_text("fix the auth bug").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let provider = LocalEmbeddingProvider::new(ModelConfig::local_default(128))
            .await
            .unwrap();
        let a = provider.embed_text("fix the auth bug").await.unwrap();
        let b = provider.embed_text("deploy the release pipeline").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn output_has_configured_dimension() {
        let provider = LocalEmbeddingProvider::new(ModelConfig::local_default(64))
            .await
            .unwrap();
        let v = provider.embed_text("short text").await.unwrap();
        assert_eq!(v.len(), 64);
    }
}
