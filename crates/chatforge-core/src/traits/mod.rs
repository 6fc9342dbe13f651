//! Trait seams to external collaborators.

pub mod lead;
pub mod provider;
pub mod store;

pub use lead::LeadSink;
pub use provider::{ChatProvider, ChatRequest, ChatStream, EmbeddingProvider, GenerateParams, StreamEvent};
pub use store::VectorStore;
