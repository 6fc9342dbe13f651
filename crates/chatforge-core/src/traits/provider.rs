//! Provider traits: embeddings and streaming chat generation.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{ChatMessage, Source, ToolCall, ToolDefinition};

/// Converts text into a fixed-length vector. One provider produces vectors
/// of one dimensionality; mixing models within a tenant's store corrupts
/// similarity math, so vectors are tagged with [`model_id`](EmbeddingProvider::model_id).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identity of the embedding model, stored alongside each vector.
    fn model_id(&self) -> &str;
}

/// Generation sampling parameters.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self { model: "gpt-4o-mini".into(), temperature: 0.7, max_tokens: None }
    }
}

/// One streaming request to the language model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Full conversation: system instruction, history, the new user message,
    /// and (on continuation calls) the model's tool call plus its result.
    pub messages: Vec<ChatMessage>,
    /// Declared function tools.
    pub tools: Vec<ToolDefinition>,
    /// Ask the provider to ground answers with its native web search.
    pub web_search: bool,
    pub params: GenerateParams,
}

/// One fragment of a model response stream. A fragment may carry any
/// combination of text, citations, and a function-call request.
#[derive(Debug, Clone, Default)]
pub struct StreamEvent {
    pub text: Option<String>,
    pub citations: Vec<Source>,
    pub tool_call: Option<ToolCall>,
}

/// A lazy, finite response stream. Dropping it drops the underlying network
/// stream, which closes the outbound connection.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A streaming chat provider. Tool round-trips are expressed as a second
/// [`stream_chat`](ChatProvider::stream_chat) call whose messages end with a
/// `Role::Tool` function-result message.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream>;
}
