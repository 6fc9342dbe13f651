//! Streaming chat session: retrieval-augmented generation with tool use.

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use chatforge_core::config::RetrievalConfig;
use chatforge_core::error::ChatForgeError;
use chatforge_core::traits::provider::{ChatProvider, ChatRequest, GenerateParams};
use chatforge_core::traits::{EmbeddingProvider, LeadSink};
use chatforge_core::types::{Chatbot, ChatMessage, Role, Source, StreamFragment};
use chatforge_knowledge::{RagService, SearchOptions};
use chatforge_security::RateLimiter;
use chatforge_tools::declarations::{ADD_LEAD, declarations_for};
use chatforge_tools::{WebhookExecutor, parse_lead_args};

/// The per-turn output stream: an ordered, append-only sequence of
/// fragments, consumed incrementally by the caller.
pub type FragmentStream = Pin<Box<dyn Stream<Item = StreamFragment> + Send>>;

/// A streaming conversation with one configured chatbot.
///
/// The session owns no conversation history — the caller passes prior
/// turns in and persists them wherever it likes.
pub struct ChatSession {
    chatbot: Chatbot,
    provider: Arc<dyn ChatProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    rag: Arc<RagService>,
    limiter: Arc<RateLimiter>,
    leads: Arc<dyn LeadSink>,
    webhooks: Arc<WebhookExecutor>,
    retrieval: RetrievalConfig,
}

impl ChatSession {
    pub fn new(
        chatbot: Chatbot,
        provider: Arc<dyn ChatProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        rag: Arc<RagService>,
        limiter: Arc<RateLimiter>,
        leads: Arc<dyn LeadSink>,
    ) -> Self {
        Self {
            chatbot,
            provider,
            embedder,
            rag,
            limiter,
            leads,
            webhooks: Arc::new(WebhookExecutor::new()),
            retrieval: RetrievalConfig::default(),
        }
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn chatbot(&self) -> &Chatbot {
        &self.chatbot
    }

    /// Run one turn: returns the fragment stream for `message` given the
    /// prior `history` (user/model turns only, no system message).
    pub fn stream_reply(&self, history: Vec<ChatMessage>, message: String) -> FragmentStream {
        let chatbot = self.chatbot.clone();
        let provider = self.provider.clone();
        let embedder = self.embedder.clone();
        let rag = self.rag.clone();
        let limiter = self.limiter.clone();
        let leads = self.leads.clone();
        let webhooks = self.webhooks.clone();
        let retrieval = self.retrieval.clone();

        let turn = stream! {
            // ═══════════════════════════════════════
            // Phase 0: Admission
            // ═══════════════════════════════════════
            if !limiter.check() {
                yield StreamFragment::text(
                    "⚠️ You are sending messages too quickly. Please wait a minute.",
                );
                return;
            }

            // ═══════════════════════════════════════
            // Phase 1: Retrieval (best effort)
            // ═══════════════════════════════════════
            let context = retrieve_context(
                &chatbot, &message, &embedder, &rag, &limiter, &retrieval,
            )
            .await;

            // ═══════════════════════════════════════
            // Phase 2: Generation
            // ═══════════════════════════════════════
            let system_instruction = build_system_instruction(&chatbot, &context);
            let tools = declarations_for(&chatbot.tools);
            let params = GenerateParams {
                model: chatbot.model.clone(),
                temperature: chatbot.temperature,
                max_tokens: None,
            };

            let mut messages = Vec::with_capacity(history.len() + 2);
            messages.push(ChatMessage::system(&system_instruction));
            messages.extend(history);
            messages.push(ChatMessage::user(&message));

            let request = ChatRequest {
                messages: messages.clone(),
                tools,
                web_search: chatbot.has_web_search(),
                params: params.clone(),
            };

            let mut seen_urls: HashSet<String> = HashSet::new();

            let upstream = match provider.stream_chat(request).await {
                Ok(s) => s,
                Err(e) => {
                    yield generation_failure_fragment(&e);
                    return;
                }
            };
            futures::pin_mut!(upstream);

            while let Some(event) = upstream.next().await {
                let event = match event {
                    Ok(ev) => ev,
                    Err(e) => {
                        yield generation_failure_fragment(&e);
                        return;
                    }
                };

                // ═══════════════════════════════════════
                // Phase 3: Tool round-trip (first call only)
                // ═══════════════════════════════════════
                if let Some(call) = event.tool_call {
                    let function_result: Value;

                    if call.function.name == ADD_LEAD {
                        match parse_lead_args(&call.function.arguments) {
                            Ok(new_lead) => {
                                match leads.capture(&chatbot.workspace_id, new_lead).await {
                                    Ok(()) => {
                                        function_result =
                                            json!({ "result": "Lead saved successfully." });
                                        yield StreamFragment::text("\n*(Lead captured)*\n");
                                    }
                                    Err(e) => {
                                        tracing::warn!("lead sink failed: {e}");
                                        function_result =
                                            json!({ "error": format!("Lead capture failed: {e}") });
                                    }
                                }
                            }
                            Err(e) => {
                                function_result = json!({ "error": e.to_string() });
                            }
                        }
                    } else if let Some(action) = chatbot.webhook(&call.function.name) {
                        yield StreamFragment::text(format!("\n*(Running {}...)*\n", action.name));
                        let args: Value = serde_json::from_str(&call.function.arguments)
                            .unwrap_or_else(|_| json!({}));
                        function_result = webhooks.execute(action, &args).await;
                    } else {
                        function_result = json!({ "error": "Function not found" });
                    }

                    // Feed the result back and relay the continuation.
                    messages.push(ChatMessage {
                        role: Role::Model,
                        text: String::new(),
                        sources: Vec::new(),
                        tool_calls: Some(vec![call.clone()]),
                        tool_call_id: None,
                    });
                    messages.push(ChatMessage::tool(function_result.to_string(), &call.id));

                    let continuation = ChatRequest {
                        messages,
                        tools: Vec::new(),
                        web_search: chatbot.has_web_search(),
                        params,
                    };
                    let follow_up = match provider.stream_chat(continuation).await {
                        Ok(s) => s,
                        Err(e) => {
                            yield generation_failure_fragment(&e);
                            return;
                        }
                    };
                    futures::pin_mut!(follow_up);
                    while let Some(event) = follow_up.next().await {
                        let event = match event {
                            Ok(ev) => ev,
                            Err(e) => {
                                yield generation_failure_fragment(&e);
                                return;
                            }
                        };
                        let sources = new_sources(&mut seen_urls, event.citations);
                        if let Some(text) = event.text {
                            yield StreamFragment::with_sources(text, sources);
                        } else if !sources.is_empty() {
                            yield StreamFragment::with_sources("", sources);
                        }
                    }
                    // One tool round-trip per turn.
                    return;
                }

                let sources = new_sources(&mut seen_urls, event.citations);
                if let Some(text) = event.text {
                    yield StreamFragment::with_sources(text, sources);
                } else if !sources.is_empty() {
                    yield StreamFragment::with_sources("", sources);
                }
            }
        };

        Box::pin(turn)
    }
}

/// Embed the user message and gather knowledge context. Every failure path
/// degrades to "no context" — a turn is never failed by retrieval.
async fn retrieve_context(
    chatbot: &Chatbot,
    message: &str,
    embedder: &Arc<dyn EmbeddingProvider>,
    rag: &Arc<RagService>,
    limiter: &Arc<RateLimiter>,
    retrieval: &RetrievalConfig,
) -> String {
    if !limiter.check() {
        tracing::debug!("query embedding skipped: rate limited");
        return String::new();
    }

    let query = match embedder.embed(message).await {
        Ok(q) => q,
        Err(e) => {
            tracing::debug!("query embedding failed, continuing without context: {e}");
            return String::new();
        }
    };

    let options = SearchOptions {
        limit: retrieval.context_limit,
        min_score: retrieval.min_score,
    };
    match rag.search(&chatbot.workspace_id, &query, &options).await {
        Ok(results) => results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        Err(e) => {
            tracing::warn!("knowledge search failed: {e}");
            String::new()
        }
    }
}

/// Assemble the system instruction: persona, tool directives, and the
/// retrieved knowledge context.
fn build_system_instruction(chatbot: &Chatbot, context: &str) -> String {
    let base = if chatbot.system_instruction.trim().is_empty() {
        "You are a helpful AI assistant."
    } else {
        chatbot.system_instruction.as_str()
    };

    let mut tools_instruction = String::new();
    if chatbot.has_lead_capture() {
        tools_instruction.push_str(
            "\nLEAD GENERATION DIRECTIVE:\n\
             1. If a user seems interested in services or needs follow-up, politely ask for their Name and Email.\n\
             2. Use the 'add_lead' tool to save it immediately.\n",
        );
    }

    let context_block = if context.is_empty() {
        "No specific context found. Rely on your general training and available tools."
    } else {
        context
    };

    format!("{base}\n{tools_instruction}\nRELEVANT KNOWLEDGE CONTEXT:\n{context_block}")
}

/// Keep only citations whose URL has not been seen this turn. First-seen
/// title wins; later duplicates are dropped entirely.
fn new_sources(seen: &mut HashSet<String>, citations: Vec<Source>) -> Vec<Source> {
    citations
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect()
}

/// One user-facing diagnostic for a dead generation stream,
/// distinguishing auth failures from connectivity failures.
fn generation_failure_fragment(e: &ChatForgeError) -> StreamFragment {
    tracing::error!("generation stream failed: {e}");
    if e.is_auth_error() {
        StreamFragment::error("Authentication error: please check your API key.")
    } else {
        StreamFragment::error("Error: could not connect to the model.")
    }
}
