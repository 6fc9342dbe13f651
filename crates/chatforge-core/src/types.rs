//! Shared data model: knowledge items and chunks, leads, chat messages,
//! stream fragments, and tool declarations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ChatForgeError, Result};

// ── Conversation ───────────────────────────────────────

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Model,
    Tool,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    /// Grounding citations attached to model turns (empty otherwise).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    /// Tool calls requested by a model turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Set on `Role::Tool` messages: which call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::plain(Role::Model, text)
    }

    /// A function result message answering `tool_call_id`.
    pub fn tool(text: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            text: text.into(),
            sources: Vec::new(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            sources: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A grounding citation: where a piece of generated text came from.
/// De-duplicated by URL; the first-seen title wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// One element of the orchestrator's per-turn output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFragment {
    pub text: String,
    /// Newly-seen sources for this fragment (already de-duplicated against
    /// everything emitted earlier in the turn).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    /// Set on the single diagnostic fragment emitted when generation fails.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl StreamFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), sources: Vec::new(), is_error: false }
    }

    pub fn with_sources(text: impl Into<String>, sources: Vec<Source>) -> Self {
        Self { text: text.into(), sources, is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), sources: Vec::new(), is_error: true }
    }
}

// ── Knowledge base ─────────────────────────────────────

/// What kind of document a knowledge item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    Text,
    File,
    Website,
    QnA,
}

impl std::fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Website => "website",
            Self::QnA => "qna",
        };
        f.write_str(s)
    }
}

/// Ingestion lifecycle of a knowledge item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeStatus {
    Processing,
    Ready,
    Error,
}

/// A logical document owned by one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub workspace_id: String,
    pub kind: KnowledgeType,
    pub name: String,
    pub content: String,
    pub date_added: DateTime<Utc>,
    pub status: KnowledgeStatus,
}

impl KnowledgeItem {
    /// Create a new item in `Processing` state with a fresh id.
    pub fn new(
        workspace_id: impl Into<String>,
        kind: KnowledgeType,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            kind,
            name: name.into(),
            content: content.into(),
            date_added: Utc::now(),
            status: KnowledgeStatus::Processing,
        }
    }
}

/// A derived, write-once unit of embedding and retrieval. Owned exclusively
/// by its parent [`KnowledgeItem`] and destroyed with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub knowledge_item_id: String,
    pub workspace_id: String,
    /// Provenance-prefixed text: `"Source: <name> (<kind>)\nContent: <segment>"`.
    pub text: String,
    pub embedding: Vec<f32>,
    /// Which embedding model produced the vector. Vectors from different
    /// models are not comparable; search skips mismatched dimensions.
    pub embedding_model: String,
}

// ── Leads ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Lost,
    Customer,
}

/// A captured business lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub inquiry_summary: String,
    pub captured_at: DateTime<Utc>,
    pub status: LeadStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The payload the reserved lead-capture tool hands to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub inquiry_summary: String,
}

// ── Tool calling ───────────────────────────────────────

/// A function declaration handed to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the parameters.
    pub parameters: serde_json::Value,
}

/// A function call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON-encoded arguments as produced by the model.
    pub arguments: String,
}

/// HTTP method for caller-defined webhook actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// A caller-defined webhook the model may invoke as a tool.
///
/// The parameter schema is validated once, when the chatbot is saved,
/// not re-parsed per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAction {
    pub name: String,
    pub description: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// JSON-schema object for the call arguments.
    pub parameters: serde_json::Value,
}

impl WebhookAction {
    /// Validate this action as a configuration value.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ChatForgeError::Config("webhook action has empty name".into()));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ChatForgeError::Config(format!(
                "webhook action '{}' has invalid URL: {}",
                self.name, self.url
            )));
        }
        if !self.parameters.is_object() {
            return Err(ChatForgeError::Config(format!(
                "webhook action '{}' parameters must be a JSON-schema object",
                self.name
            )));
        }
        Ok(())
    }
}

/// A tool the chatbot may use, declared at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    /// The reserved `add_lead` function backed by the lead-capture sink.
    LeadCapture,
    /// Provider-native web search with grounding citations.
    WebSearch,
    /// A caller-defined HTTP action.
    Webhook(WebhookAction),
}

// ── Chatbot configuration ──────────────────────────────

/// A configured chatbot: persona, model, and tool set for one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chatbot {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub model: String,
    /// The persona / base system instruction.
    pub system_instruction: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Chatbot {
    pub fn new(workspace_id: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            name: name.into(),
            model: model.into(),
            system_instruction: String::new(),
            temperature: default_temperature(),
            tools: Vec::new(),
        }
    }

    /// Validate the chatbot as a configuration value. Called at save time so
    /// bad webhook schemas are rejected before they ever reach a model call.
    pub fn validate(&self) -> Result<()> {
        for spec in &self.tools {
            if let ToolSpec::Webhook(action) = spec {
                action.validate()?;
            }
        }
        Ok(())
    }

    /// Look up a webhook action by its tool name.
    pub fn webhook(&self, name: &str) -> Option<&WebhookAction> {
        self.tools.iter().find_map(|spec| match spec {
            ToolSpec::Webhook(action) if action.name == name => Some(action),
            _ => None,
        })
    }

    /// Whether a given built-in tool is enabled.
    pub fn has_lead_capture(&self) -> bool {
        self.tools.iter().any(|t| matches!(t, ToolSpec::LeadCapture))
    }

    pub fn has_web_search(&self) -> bool {
        self.tools.iter().any(|t| matches!(t, ToolSpec::WebSearch))
    }
}
