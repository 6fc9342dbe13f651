//! Argument handling for the reserved `add_lead` tool, plus an in-process
//! sink implementation.

use async_trait::async_trait;
use std::sync::Mutex;

use chatforge_core::error::{ChatForgeError, Result};
use chatforge_core::traits::LeadSink;
use chatforge_core::types::{Lead, LeadStatus, NewLead};

/// Parse and validate the model-supplied arguments for `add_lead`.
///
/// `name` and `inquiry_summary` must be present and non-empty; `email` and
/// `phone` are optional.
pub fn parse_lead_args(arguments: &str) -> Result<NewLead> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| ChatForgeError::Tool(format!("add_lead arguments are not JSON: {e}")))?;

    let name = args["name"].as_str().unwrap_or("").trim().to_string();
    let inquiry_summary = args["inquiry_summary"].as_str().unwrap_or("").trim().to_string();

    if name.is_empty() {
        return Err(ChatForgeError::Tool("add_lead requires a name".into()));
    }
    if inquiry_summary.is_empty() {
        return Err(ChatForgeError::Tool("add_lead requires an inquiry summary".into()));
    }

    Ok(NewLead {
        name,
        email: args["email"].as_str().map(str::to_string),
        phone: args["phone"].as_str().map(str::to_string),
        inquiry_summary,
    })
}

/// In-process [`LeadSink`] that accumulates captured leads.
#[derive(Default)]
pub struct MemoryLeadSink {
    leads: Mutex<Vec<Lead>>,
}

impl MemoryLeadSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.leads.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.leads.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LeadSink for MemoryLeadSink {
    async fn capture(&self, workspace_id: &str, lead: NewLead) -> Result<()> {
        let lead = Lead {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            inquiry_summary: lead.inquiry_summary,
            captured_at: chrono::Utc::now(),
            status: LeadStatus::New,
            tags: Vec::new(),
            notes: None,
        };
        tracing::info!(workspace = workspace_id, lead = %lead.name, "lead captured");
        self.leads
            .lock()
            .map_err(|e| ChatForgeError::Tool(format!("lead sink poisoned: {e}")))?
            .push(lead);
        Ok(())
    }
}
