//! ChatForge error types.

use thiserror::Error;

/// Convenience alias used across all ChatForge crates.
pub type Result<T> = std::result::Result<T, ChatForgeError>;

/// Unified error type for the ChatForge workspace.
#[derive(Debug, Error)]
pub enum ChatForgeError {
    /// The process-wide admission gate rejected the call. Soft failure:
    /// callers surface a retry-later message, never a hard error.
    #[error("Rate limit exceeded. Please wait a moment.")]
    RateLimited,

    /// An embedding call failed (auth, network, quota).
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A language-model provider call failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// No API key configured for a provider that requires one.
    #[error("No API key configured for provider '{0}'")]
    ApiKeyMissing(String),

    /// Unknown provider name in configuration.
    #[error("Unknown provider: {0}")]
    ProviderNotFound(String),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Vector / knowledge store failure, including tenant-integrity
    /// violations (those indicate a programming error in the caller).
    #[error("Store error: {0}")]
    Store(String),

    /// A tool (webhook, lead capture) failed in a way that cannot be
    /// converted into a model-facing error payload.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Configuration load/parse/validation failure.
    #[error("Config error: {0}")]
    Config(String),

    /// Caller handed us something unusable (empty query, bad arguments).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatForgeError {
    /// Whether this error looks like an authentication/key problem rather
    /// than a connectivity one. Drives the user-facing diagnostic text the
    /// orchestrator emits when a generation stream dies.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::ApiKeyMissing(_) => true,
            Self::Provider(msg) | Self::Http(msg) | Self::Embedding(msg) => {
                let m = msg.to_lowercase();
                m.contains("401")
                    || m.contains("403")
                    || m.contains("api key")
                    || m.contains("unauthorized")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_detection() {
        assert!(ChatForgeError::ApiKeyMissing("openai".into()).is_auth_error());
        assert!(ChatForgeError::Provider("openai API error 401: bad key".into()).is_auth_error());
        assert!(ChatForgeError::Http("403 Forbidden".into()).is_auth_error());
        assert!(!ChatForgeError::Provider("connection refused".into()).is_auth_error());
        assert!(!ChatForgeError::RateLimited.is_auth_error());
    }
}
