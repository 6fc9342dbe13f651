//! # ChatForge Knowledge Base
//!
//! The retrieval half of the RAG pipeline: chunk documents, embed the
//! chunks through a caller-supplied provider, store them per workspace,
//! and rank them by cosine similarity at query time.
//!
//! ## How it works
//! ```text
//! KnowledgeItem (raw text)
//!   ↓ chunker — overlapping ~800-char segments, boundary-aware
//! segments
//!   ↓ provenance prefix + EmbeddingProvider
//! KnowledgeChunks (text + vector)
//!   ↓ VectorStore::append_chunks (one batch)
//! workspace-scoped store
//!   ↓ RagService::search — cosine similarity, stable ranking
//! Top-k chunks injected into the agent's system instruction
//! ```

pub mod chunker;
pub mod rag;
pub mod sqlite;
pub mod store;

pub use rag::{RagService, ScoredChunk, SearchOptions, cosine_similarity};
pub use sqlite::SqliteVectorStore;
pub use store::MemoryVectorStore;
