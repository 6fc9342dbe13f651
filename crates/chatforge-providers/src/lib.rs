//! # ChatForge Providers
//!
//! LLM provider implementations for ChatForge.
//!
//! All OpenAI-compatible providers (OpenAI, Groq, DeepSeek, OpenRouter,
//! Gemini, Ollama) are handled by a single [`OpenAiCompatibleProvider`],
//! which implements both the streaming chat seam and the embedding seam.

pub mod openai_compatible;
pub mod registry;

use std::sync::Arc;

use chatforge_core::config::ChatForgeConfig;
use chatforge_core::error::{ChatForgeError, Result};

pub use openai_compatible::OpenAiCompatibleProvider;

/// Create a provider from configuration.
///
/// The returned value implements both `ChatProvider` and
/// `EmbeddingProvider`; clone the `Arc` and coerce per seam.
pub fn create_provider(config: &ChatForgeConfig) -> Result<Arc<OpenAiCompatibleProvider>> {
    let name = config.provider.as_str();

    // Custom endpoint: "custom:https://my-server.com/v1"
    if name.starts_with("custom:") {
        return Ok(Arc::new(OpenAiCompatibleProvider::custom(name, config)?));
    }

    let endpoint = registry::get_endpoint(name)
        .ok_or_else(|| ChatForgeError::ProviderNotFound(name.into()))?;
    Ok(Arc::new(OpenAiCompatibleProvider::from_registry(endpoint, config)?))
}

/// List all available provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = registry::all_provider_names();
    names.push("custom");
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_provider() {
        let config = ChatForgeConfig { provider: "openai".into(), ..Default::default() };
        assert!(create_provider(&config).is_ok());
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = ChatForgeConfig { provider: "nope".into(), ..Default::default() };
        assert!(matches!(
            create_provider(&config),
            Err(ChatForgeError::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_custom_endpoint() {
        let config = ChatForgeConfig {
            provider: "custom:https://llm.internal/v1".into(),
            ..Default::default()
        };
        assert!(create_provider(&config).is_ok());
    }
}
