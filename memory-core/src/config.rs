//! Store configuration: storage backend selection, embedding backend,
//! policy thresholds, and cache sizing, loaded from TOML with environment
//! overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Remote libSQL/Turso-style server URL. When set alongside `auth_token`,
    /// the store dials the server backend first and falls back to
    /// `embedded_path` if the connection fails.
    pub server_url: Option<String>,
    pub auth_token: Option<String>,
    /// Local embedded database file path, used standalone or as the
    /// server-connection fallback.
    pub embedded_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            auth_token: None,
            embedded_path: "memory.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub dimension: usize,
    /// Base URL for the remote OpenAI-compatible embeddings endpoint.
    /// Only consulted when `mode` is `remote`.
    pub remote_base_url: Option<String>,
    pub remote_model: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Local,
            dimension: crate::embeddings::DEFAULT_EMBEDDING_DIM,
            remote_base_url: None,
            remote_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: crate::constants::cache::CAPACITY,
            ttl_seconds: crate::constants::cache::TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub max_age_days: i64,
    pub quarantine_on_wrong_threshold: u32,
    pub delete_on_wrong_threshold: u32,
    pub min_usefulness: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_age_days: crate::constants::policy::MAX_AGE_DAYS,
            quarantine_on_wrong_threshold: crate::constants::policy::QUARANTINE_ON_WRONG_THRESHOLD,
            delete_on_wrong_threshold: crate::constants::policy::DELETE_ON_WRONG_THRESHOLD,
            min_usefulness: crate::constants::policy::MIN_USEFULNESS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl StoreConfig {
    /// Load from a TOML file at `path`, then apply environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails to parse as TOML.
    pub fn load(path: &Path) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::Error::Configuration(e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from the default location (`./memory.toml`) if present,
    /// otherwise fall back to built-in defaults; environment overrides are
    /// always applied.
    ///
    /// # Errors
    /// Returns an error if `./memory.toml` exists but fails to parse.
    pub fn load_default() -> Result<Self, crate::error::Error> {
        let default_path = Path::new("memory.toml");
        let mut config = if default_path.exists() {
            Self::load(default_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// `MEMORY_DB_SERVER_URL`, `MEMORY_DB_AUTH_TOKEN`, and
    /// `MEMORY_DB_EMBEDDED_PATH` override the corresponding file settings,
    /// letting deployments keep secrets out of the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MEMORY_DB_SERVER_URL") {
            self.database.server_url = Some(url);
        }
        if let Ok(token) = std::env::var("MEMORY_DB_AUTH_TOKEN") {
            self.database.auth_token = Some(token);
        }
        if let Ok(path) = std::env::var("MEMORY_DB_EMBEDDED_PATH") {
            self.database.embedded_path = path;
        }
    }

    /// # Errors
    /// Returns an error describing the first invalid field encountered.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.cache.capacity == 0 {
            return Err(crate::error::Error::Configuration(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(crate::error::Error::Configuration(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }
        if self.policy.quarantine_on_wrong_threshold > self.policy.delete_on_wrong_threshold {
            return Err(crate::error::Error::Configuration(
                "policy.quarantine_on_wrong_threshold must not exceed delete_on_wrong_threshold"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let mut config = StoreConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_wrong_thresholds_are_rejected() {
        let mut config = StoreConfig::default();
        config.policy.quarantine_on_wrong_threshold = 10;
        config.policy.delete_on_wrong_threshold = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_toml_text() {
        let toml_text = r#"
            [database]
            embedded_path = "custom.db"

            [cache]
            capacity = 50
            ttl_seconds = 60
        "#;
        let config: StoreConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.database.embedded_path, "custom.db");
        assert_eq!(config.cache.capacity, 50);
    }
}
