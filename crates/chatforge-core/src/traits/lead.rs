//! Lead-capture sink seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::NewLead;

/// Receives leads captured by the reserved `add_lead` tool.
///
/// Invoked synchronously within the tool round-trip; implementations that
/// need durable persistence should hand off quickly.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn capture(&self, workspace_id: &str, lead: NewLead) -> Result<()>;
}
