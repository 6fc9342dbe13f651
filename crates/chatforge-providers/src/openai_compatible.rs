//! Unified OpenAI-compatible provider.
//!
//! A single struct that handles streaming chat completions and embeddings
//! for ALL OpenAI-compatible APIs. Different providers are distinguished
//! only by endpoint URL, auth style, and API key.
//!
//! Chat responses stream as server-sent events; tool-call deltas are
//! accumulated across events and surfaced as one completed call when the
//! provider signals `finish_reason: "tool_calls"`. `url_citation`
//! annotations become grounding [`Source`]s on the fragment that carried
//! them.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};

use chatforge_core::config::ChatForgeConfig;
use chatforge_core::error::{ChatForgeError, Result};
use chatforge_core::traits::provider::{
    ChatProvider, ChatRequest, ChatStream, EmbeddingProvider, StreamEvent,
};
use chatforge_core::types::{ChatMessage, FunctionCall, Role, Source, ToolCall};

use crate::registry::{AuthStyle, ProviderEndpoint};

/// A unified provider that works with any OpenAI-compatible API.
pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g., "openai", "groq", "deepseek").
    name: String,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Path for chat completions (e.g., "/chat/completions").
    chat_path: String,
    /// Path for embeddings (e.g., "/embeddings").
    embeddings_path: String,
    /// Embedding model identity, stored on every vector it produces.
    embedding_model: String,
    /// Authentication style.
    auth_style: AuthStyle,
    /// HTTP client.
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create from a known provider endpoint + ChatForgeConfig.
    ///
    /// Resolution order:
    /// - API key: `config.api_key` > env vars > empty
    /// - Base URL: env override > registry default
    pub fn from_registry(endpoint: &ProviderEndpoint, config: &ChatForgeConfig) -> Result<Self> {
        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            endpoint
                .env_keys
                .iter()
                .find_map(|key| std::env::var(key).ok())
                .unwrap_or_default()
        };

        let base_url = endpoint
            .base_url_env
            .and_then(|env_key| {
                let val = std::env::var(env_key).ok()?;
                // For OLLAMA_HOST-style overrides, append /v1 if not present
                if val.ends_with("/v1") {
                    Some(val)
                } else {
                    Some(format!("{}/v1", val.trim_end_matches('/')))
                }
            })
            .unwrap_or_else(|| endpoint.base_url.to_string());

        Ok(Self {
            name: endpoint.name.to_string(),
            api_key,
            base_url,
            chat_path: endpoint.chat_path.to_string(),
            embeddings_path: endpoint.embeddings_path.to_string(),
            embedding_model: config.embedding_model.clone(),
            auth_style: endpoint.auth_style,
            client: reqwest::Client::new(),
        })
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &str, config: &ChatForgeConfig) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();

        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };

        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            embeddings_path: "/embeddings".to_string(),
            embedding_model: config.embedding_model.clone(),
            auth_style,
            client: reqwest::Client::new(),
        })
    }

    /// Build the auth header for the request.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(ChatForgeError::ApiKeyMissing(self.name.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.require_key()?;

        let url = format!("{}{}", self.base_url, self.embeddings_path);
        let body = json!({
            "model": self.embedding_model,
            "input": text,
        });

        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let resp = self.apply_auth(req).send().await.map_err(|e| {
            ChatForgeError::Embedding(format!("{} connection failed: {e}", self.name))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ChatForgeError::Embedding(format!(
                "{} API error {status}: {text}",
                self.name
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ChatForgeError::Embedding(e.to_string()))?;

        let vector = json["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| ChatForgeError::Embedding("no embedding in response".into()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream> {
        self.require_key()?;

        let mut body = json!({
            "model": request.params.model,
            "temperature": request.params.temperature,
            "stream": true,
            "messages": wire_messages(&request.messages),
        });
        if let Some(max_tokens) = request.params.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            let tool_defs: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tool_defs);
        }
        if request.web_search {
            body["web_search_options"] = json!({});
        }

        let url = format!("{}{}", self.base_url, self.chat_path);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let resp = self.apply_auth(req).send().await.map_err(|e| {
            ChatForgeError::Http(format!("{} connection failed ({url}): {e}", self.name))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ChatForgeError::Provider(format!(
                "{} API error {status}: {text}",
                self.name
            )));
        }

        let provider_name = self.name.clone();
        let stream = try_stream! {
            let mut bytes = resp.bytes_stream();
            let mut buf = String::new();
            let mut pending = ToolCallAccumulator::default();
            let mut call_emitted = false;

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| {
                    ChatForgeError::Http(format!("{provider_name} stream failed: {e}"))
                })?;
                buf.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE lines; keep the partial tail buffered.
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);

                    let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }

                    let parsed: Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::debug!("skipping unparseable SSE line: {e}");
                            continue;
                        }
                    };

                    let choice = &parsed["choices"][0];
                    let delta = &choice["delta"];

                    pending.absorb(&delta["tool_calls"]);

                    let text = delta["content"].as_str().map(String::from);
                    let citations = parse_citations(delta);

                    if text.is_some() || !citations.is_empty() {
                        yield StreamEvent { text, citations, tool_call: None };
                    }

                    if choice["finish_reason"].as_str() == Some("tool_calls")
                        && let Some(call) = pending.take_first()
                    {
                        call_emitted = true;
                        yield StreamEvent { tool_call: Some(call), ..Default::default() };
                    }
                }
            }

            // Some servers close the stream without a finish_reason line.
            if !call_emitted
                && let Some(call) = pending.take_first()
            {
                yield StreamEvent { tool_call: Some(call), ..Default::default() };
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Map conversation messages onto the OpenAI wire shape.
fn wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut obj = json!({
                "role": wire_role(m.role),
                "content": m.text,
            });
            if let Some(calls) = &m.tool_calls {
                obj["tool_calls"] = calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.function.name,
                                "arguments": c.function.arguments,
                            }
                        })
                    })
                    .collect::<Vec<_>>()
                    .into();
            }
            if let Some(id) = &m.tool_call_id {
                obj["tool_call_id"] = json!(id);
            }
            obj
        })
        .collect()
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Model => "assistant",
        Role::Tool => "tool",
    }
}

/// Grounding citations carried on a streamed delta.
fn parse_citations(delta: &Value) -> Vec<Source> {
    let Some(annotations) = delta["annotations"].as_array() else {
        return Vec::new();
    };
    annotations
        .iter()
        .filter_map(|a| {
            let citation = &a["url_citation"];
            let url = citation["url"].as_str()?;
            Some(Source {
                title: citation["title"].as_str().unwrap_or(url).to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Accumulates streamed tool-call deltas into complete calls.
#[derive(Default)]
struct ToolCallAccumulator {
    calls: Vec<(String, String, String)>,
}

impl ToolCallAccumulator {
    fn absorb(&mut self, deltas: &Value) {
        let Some(deltas) = deltas.as_array() else {
            return;
        };
        for delta in deltas {
            let index = delta["index"].as_u64().unwrap_or(0) as usize;
            while self.calls.len() <= index {
                self.calls.push((String::new(), String::new(), String::new()));
            }
            let slot = &mut self.calls[index];
            if let Some(id) = delta["id"].as_str() {
                slot.0.push_str(id);
            }
            if let Some(name) = delta["function"]["name"].as_str() {
                slot.1.push_str(name);
            }
            if let Some(args) = delta["function"]["arguments"].as_str() {
                slot.2.push_str(args);
            }
        }
    }

    /// The first completed call, if any. Only the first call per response is
    /// ever executed — tool use is serial by design.
    fn take_first(&mut self) -> Option<ToolCall> {
        if self.calls.is_empty() || self.calls[0].1.is_empty() {
            return None;
        }
        let (id, name, arguments) = std::mem::take(&mut self.calls[0]);
        self.calls.clear();
        Some(ToolCall {
            id,
            function: FunctionCall { name, arguments },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_role_mapping() {
        assert_eq!(wire_role(Role::Model), "assistant");
        assert_eq!(wire_role(Role::Tool), "tool");
        assert_eq!(wire_role(Role::System), "system");
        assert_eq!(wire_role(Role::User), "user");
    }

    #[test]
    fn test_wire_messages_tool_result() {
        let messages = vec![
            ChatMessage::user("hello"),
            ChatMessage::tool(r#"{"result":"ok"}"#, "call_42"),
        ];
        let wire = wire_messages(&messages);
        assert_eq!(wire[0]["role"], "user");
        assert_eq!(wire[1]["role"], "tool");
        assert_eq!(wire[1]["tool_call_id"], "call_42");
        assert!(wire[0].get("tool_call_id").is_none());
    }

    #[test]
    fn test_wire_messages_assistant_tool_calls() {
        let mut msg = ChatMessage::model("");
        msg.tool_calls = Some(vec![ToolCall {
            id: "call_1".into(),
            function: FunctionCall {
                name: "check_order".into(),
                arguments: r#"{"order_id":"7"}"#.into(),
            },
        }]);
        let wire = wire_messages(&[msg]);
        assert_eq!(wire[0]["tool_calls"][0]["function"]["name"], "check_order");
        assert_eq!(wire[0]["tool_calls"][0]["type"], "function");
    }

    #[test]
    fn test_tool_call_accumulation_across_deltas() {
        let mut acc = ToolCallAccumulator::default();
        acc.absorb(&json!([
            {"index": 0, "id": "call_9", "function": {"name": "check_order", "arguments": ""}}
        ]));
        acc.absorb(&json!([
            {"index": 0, "function": {"arguments": "{\"order_id\":"}}
        ]));
        acc.absorb(&json!([
            {"index": 0, "function": {"arguments": "\"7\"}"}}
        ]));

        let call = acc.take_first().unwrap();
        assert_eq!(call.id, "call_9");
        assert_eq!(call.function.name, "check_order");
        assert_eq!(call.function.arguments, r#"{"order_id":"7"}"#);
        // Consumed: nothing left.
        assert!(acc.take_first().is_none());
    }

    #[test]
    fn test_accumulator_empty_when_no_calls() {
        let mut acc = ToolCallAccumulator::default();
        acc.absorb(&json!(null));
        assert!(acc.take_first().is_none());
    }

    #[test]
    fn test_parse_citations() {
        let delta = json!({
            "content": "text",
            "annotations": [
                {"type": "url_citation", "url_citation": {"url": "https://a.example", "title": "A"}},
                {"type": "url_citation", "url_citation": {"url": "https://b.example"}},
                {"type": "other"}
            ]
        });
        let citations = parse_citations(&delta);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].title, "A");
        // Missing title falls back to the URL.
        assert_eq!(citations[1].title, "https://b.example");
    }
}
