//! # ChatForge Tools
//!
//! Everything the model can ask the orchestrator to do mid-generation:
//! the reserved lead-capture function, caller-defined webhook actions,
//! and the declarations handed to the language model.

pub mod declarations;
pub mod lead_capture;
pub mod webhook;

pub use declarations::{declarations_for, lead_capture_declaration, validate_args};
pub use lead_capture::{MemoryLeadSink, parse_lead_args};
pub use webhook::WebhookExecutor;
