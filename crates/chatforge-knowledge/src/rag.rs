//! Retrieval engine: orchestrates chunking, embedding, storage, and
//! cosine-similarity search.
//!
//! Indexing is best-effort by design: a chunk whose embedding call fails is
//! skipped, the rest of the document is still stored, and the item is
//! marked ready. A document with a few unembeddable chunks is still
//! partially searchable, which beats blocking the whole upload.

use std::sync::Arc;

use chatforge_core::error::Result;
use chatforge_core::traits::{EmbeddingProvider, VectorStore};
use chatforge_core::types::{KnowledgeChunk, KnowledgeItem, KnowledgeStatus};

use crate::chunker::{ChunkConfig, chunk_text};

/// Retrieval tuning for one search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum results to return.
    pub limit: usize,
    /// Minimum cosine similarity. `None` (the default) is deliberately
    /// permissive: callers always receive the best available matches, even
    /// when every score is low.
    pub min_score: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { limit: 5, min_score: None }
    }
}

/// A chunk with its similarity score against the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: KnowledgeChunk,
    pub score: f32,
}

/// The knowledge retrieval engine.
pub struct RagService {
    store: Arc<dyn VectorStore>,
    chunking: ChunkConfig,
}

impl RagService {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store, chunking: ChunkConfig::default() }
    }

    pub fn with_chunking(store: Arc<dyn VectorStore>, chunking: ChunkConfig) -> Self {
        Self { store, chunking }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Save a new item and index it.
    pub async fn ingest(
        &self,
        item: KnowledgeItem,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<usize> {
        self.store.save_item(&item).await?;
        self.process_and_store(&item, embedder).await
    }

    /// Chunk, embed, and store a knowledge item. Returns how many chunks
    /// were stored.
    ///
    /// Per-chunk embedding failures are logged and skipped; the item is
    /// marked `Ready` as long as the store accepts the batch. Only a store
    /// failure marks the item `Error`.
    pub async fn process_and_store(
        &self,
        item: &KnowledgeItem,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<usize> {
        let segments = chunk_text(&item.content, &self.chunking);
        tracing::info!(
            item = %item.name,
            segments = segments.len(),
            "chunked knowledge item"
        );

        let mut chunks = Vec::with_capacity(segments.len());
        for segment in &segments {
            let text = format!(
                "Source: {} ({})\nContent: {}",
                item.name, item.kind, segment
            );
            match embedder.embed(&text).await {
                Ok(embedding) => chunks.push(KnowledgeChunk {
                    id: uuid::Uuid::new_v4().to_string(),
                    knowledge_item_id: item.id.clone(),
                    workspace_id: item.workspace_id.clone(),
                    text,
                    embedding,
                    embedding_model: embedder.model_id().to_string(),
                }),
                Err(e) => {
                    let preview: String = segment.chars().take(30).collect();
                    tracing::warn!("failed to embed chunk \"{preview}...\": {e}");
                }
            }
        }

        let stored = chunks.len();
        let result = async {
            if !chunks.is_empty() {
                self.store.append_chunks(&chunks).await?;
            }
            self.store
                .update_item_status(&item.id, KnowledgeStatus::Ready)
                .await
        }
        .await;

        if let Err(e) = result {
            let _ = self
                .store
                .update_item_status(&item.id, KnowledgeStatus::Error)
                .await;
            return Err(e);
        }

        Ok(stored)
    }

    /// Rank a tenant's chunks against `query_embedding` by cosine
    /// similarity and return the top matches.
    ///
    /// An empty store yields an empty result. Chunks whose vectors have a
    /// different dimensionality than the query (a different embedding
    /// model) are skipped rather than scored — comparing them would
    /// produce garbage rankings.
    pub async fn search(
        &self,
        workspace_id: &str,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<ScoredChunk>> {
        let all_chunks = self.store.chunks_for(workspace_id).await?;
        if all_chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut skipped = 0usize;
        let mut scored: Vec<ScoredChunk> = all_chunks
            .into_iter()
            .filter_map(|chunk| {
                if chunk.embedding.len() != query_embedding.len() {
                    skipped += 1;
                    return None;
                }
                let score = cosine_similarity(query_embedding, &chunk.embedding);
                Some(ScoredChunk { chunk, score })
            })
            .collect();

        if skipped > 0 {
            tracing::warn!(
                workspace = workspace_id,
                skipped,
                "skipped chunks with mismatched embedding dimensionality"
            );
        }

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(min) = options.min_score {
            scored.retain(|s| s.score >= min);
        }
        scored.truncate(options.limit);
        Ok(scored)
    }

    /// Delete an item and all of its chunks.
    pub async fn delete_item(&self, item_id: &str) -> Result<()> {
        self.store.delete_item(item_id).await
    }
}

/// Cosine similarity between two vectors: `dot(a,b) / (‖a‖·‖b‖)`.
///
/// Defined as 0.0 when either vector has zero magnitude, which guards the
/// division and keeps NaN out of the ranking. Magnitude carries no meaning
/// for text embeddings; only direction drives relevance.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let mag_a = mag_a.sqrt();
    let mag_b = mag_b.sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryVectorStore;
    use async_trait::async_trait;
    use chatforge_core::error::ChatForgeError;
    use chatforge_core::types::KnowledgeType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps text onto a fixed vector per keyword; fails never.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.to_lowercase().contains("return") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        fn model_id(&self) -> &str {
            "keyword-test"
        }
    }

    /// Fails on every third call.
    struct FlakyEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 3 == 0 {
                Err(ChatForgeError::Embedding("quota exceeded".into()))
            } else {
                Ok(vec![1.0, 0.0, 0.0])
            }
        }

        fn model_id(&self) -> &str {
            "flaky-test"
        }
    }

    fn service() -> RagService {
        RagService::new(Arc::new(MemoryVectorStore::new()))
    }

    async fn seed_chunks(rag: &RagService, workspace: &str, embeddings: &[Vec<f32>]) {
        let item = KnowledgeItem::new(workspace, KnowledgeType::Text, "seed", "seed");
        rag.store().save_item(&item).await.unwrap();
        let chunks: Vec<KnowledgeChunk> = embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| KnowledgeChunk {
                id: format!("c{i}"),
                knowledge_item_id: item.id.clone(),
                workspace_id: workspace.into(),
                text: format!("chunk {i}"),
                embedding: e.clone(),
                embedding_model: "test".into(),
            })
            .collect();
        rag.store().append_chunks(&chunks).await.unwrap();
    }

    #[test]
    fn test_cosine_self_similarity_is_one() {
        let v = vec![0.3f32, -0.7, 2.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_symmetry() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![-1.0f32, 0.5, 2.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let a = vec![1.0f32, 2.0];
        let zero = vec![0.0f32, 0.0];
        assert_eq!(cosine_similarity(&a, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let rag = service();
        let results = rag
            .search("nobody", &[1.0, 0.0], &SearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranking() {
        let rag = service();
        seed_chunks(
            &rag,
            "ws1",
            &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1]],
        )
        .await;

        let results = rag
            .search("ws1", &[1.0, 0.0], &SearchOptions { limit: 2, min_score: None })
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "c0");
        assert_eq!(results[1].chunk.id, "c2");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_search_min_score_filter() {
        let rag = service();
        seed_chunks(&rag, "ws1", &[vec![1.0, 0.0], vec![0.0, 1.0]]).await;

        let strict = SearchOptions { limit: 5, min_score: Some(0.5) };
        let results = rag.search("ws1", &[1.0, 0.0], &strict).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c0");
    }

    #[tokio::test]
    async fn test_search_skips_mismatched_dimensions() {
        let rag = service();
        seed_chunks(&rag, "ws1", &[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]).await;

        let results = rag
            .search("ws1", &[1.0, 0.0], &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c0");
    }

    #[tokio::test]
    async fn test_process_and_store_prefixes_provenance() {
        let rag = service();
        let content = "Items can be returned within 30 days of purchase for a full refund.";
        let item = KnowledgeItem::new("ws1", KnowledgeType::Text, "Return Policy", content);
        let stored = rag.ingest(item.clone(), &KeywordEmbedder).await.unwrap();
        assert_eq!(stored, 1);

        let chunks = rag.store().chunks_for("ws1").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("Source: Return Policy (text)\nContent:"));
        assert!(chunks[0].text.contains("returned within 30 days"));
        assert_eq!(chunks[0].embedding_model, "keyword-test");

        let fetched = rag.store().get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, KnowledgeStatus::Ready);
    }

    #[tokio::test]
    async fn test_partial_embedding_failure_tolerated() {
        // A document producing 7 chunks with an embedder that fails every
        // third call: 5 chunks stored, item still Ready.
        let store = Arc::new(MemoryVectorStore::new());
        let rag = RagService::with_chunking(
            store.clone(),
            ChunkConfig { chunk_size: 30, overlap: 0 },
        );

        // One line per window: each line is longer than the chunk size, so
        // the newline search cuts exactly at line ends — 7 lines, 7 chunks.
        let content = (0..7)
            .map(|i| format!("paragraph {i} carries extra padding data"))
            .collect::<Vec<_>>()
            .join("\n");
        let item = KnowledgeItem::new("ws1", KnowledgeType::File, "doc", &content);

        let embedder = FlakyEmbedder { calls: AtomicUsize::new(0) };
        let stored = rag.ingest(item.clone(), &embedder).await.unwrap();

        assert_eq!(stored, 5);
        assert_eq!(store.chunks_for("ws1").await.unwrap().len(), 5);
        let fetched = store.get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, KnowledgeStatus::Ready);
    }

    #[tokio::test]
    async fn test_empty_content_still_ready() {
        let rag = service();
        let item = KnowledgeItem::new("ws1", KnowledgeType::Text, "empty", "");
        let stored = rag.ingest(item.clone(), &KeywordEmbedder).await.unwrap();
        assert_eq!(stored, 0);
        let fetched = rag.store().get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, KnowledgeStatus::Ready);
    }

    #[tokio::test]
    async fn test_end_to_end_retrieval() {
        let rag = service();
        let item = KnowledgeItem::new(
            "ws1",
            KnowledgeType::Text,
            "Return Policy",
            "Items can be returned within 30 days of purchase for a full refund.",
        );
        rag.ingest(item, &KeywordEmbedder).await.unwrap();

        // Query embedding close to the policy content.
        let query = KeywordEmbedder.embed("can I return my order?").await.unwrap();
        let results = rag
            .search("ws1", &query, &SearchOptions { limit: 4, min_score: None })
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert!(results[0].chunk.text.contains("returned within 30 days"));
    }
}
