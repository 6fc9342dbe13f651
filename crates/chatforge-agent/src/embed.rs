//! Rate-gated embedding wrapper.

use async_trait::async_trait;
use std::sync::Arc;

use chatforge_core::error::{ChatForgeError, Result};
use chatforge_core::traits::EmbeddingProvider;
use chatforge_security::RateLimiter;

/// Wraps an [`EmbeddingProvider`] behind the shared admission gate.
///
/// Used on the ingestion path: a rate-limited chunk fails its embedding
/// call, which the retrieval engine's best-effort policy then skips.
pub struct GatedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    limiter: Arc<RateLimiter>,
}

impl GatedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.limiter.check() {
            return Err(ChatForgeError::RateLimited);
        }
        self.inner.embed(text).await
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_gate_rejects_when_exhausted() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(60)));
        let gated = GatedEmbedder::new(Arc::new(FixedEmbedder), limiter);

        assert!(gated.embed("first").await.is_ok());
        assert!(matches!(
            gated.embed("second").await,
            Err(ChatForgeError::RateLimited)
        ));
        assert_eq!(gated.model_id(), "fixed");
    }
}
