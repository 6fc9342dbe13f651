//! ChatForge configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatForgeConfig {
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_api_key() -> String { String::new() }
fn default_provider() -> String { "openai".into() }
fn default_model() -> String { "gpt-4o-mini".into() }
fn default_embedding_model() -> String { "text-embedding-3-small".into() }
fn default_temperature() -> f32 { 0.7 }

impl Default for ChatForgeConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            provider: default_provider(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            retrieval: RetrievalConfig::default(),
            rate_limit: RateLimitConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl ChatForgeConfig {
    /// Load config from the default path (~/.chatforge/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::ChatForgeError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::ChatForgeError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChatForgeError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the ChatForge home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatforge")
    }
}

/// Retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// How many chunks the orchestrator injects as context per turn.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    /// Minimum cosine similarity for a chunk to be returned. `None` keeps
    /// the permissive policy: callers always get the best available matches.
    #[serde(default)]
    pub min_score: Option<f32>,
}

fn default_context_limit() -> usize { 4 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { context_limit: default_context_limit(), min_score: None }
    }
}

/// Outbound-call admission gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit")]
    pub limit: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_rate_limit() -> usize { 20 }
fn default_window_secs() -> u64 { 60 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { limit: default_rate_limit(), window_secs: default_window_secs() }
    }
}

/// Knowledge store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "sqlite".
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_backend() -> String { "sqlite".into() }
fn default_db_path() -> String { "~/.chatforge/knowledge.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: default_backend(), path: default_db_path() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatForgeConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.retrieval.context_limit, 4);
        assert!(config.retrieval.min_score.is_none());
        assert_eq!(config.rate_limit.limit, 20);
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ChatForgeConfig = toml::from_str(
            r#"
            provider = "groq"
            [retrieval]
            min_score = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, "groq");
        assert_eq!(config.retrieval.min_score, Some(0.5));
        assert_eq!(config.retrieval.context_limit, 4);
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_roundtrip() {
        let config = ChatForgeConfig::default();
        let encoded = toml::to_string_pretty(&config).unwrap();
        let decoded: ChatForgeConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.embedding_model, config.embedding_model);
    }
}
