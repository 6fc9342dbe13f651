//! Lowers configured [`ToolSpec`]s into the function declarations the
//! language model sees.

use chatforge_core::types::{ToolDefinition, ToolSpec};

/// The reserved tool name for lead capture.
pub const ADD_LEAD: &str = "add_lead";

/// Declaration for the built-in lead-capture function.
pub fn lead_capture_declaration() -> ToolDefinition {
    ToolDefinition {
        name: ADD_LEAD.into(),
        description: "Save a new business lead or customer contact information when the user provides their name, email, phone, or specific inquiry details.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "The customer's name." },
                "email": { "type": "string", "description": "The customer's email address." },
                "phone": { "type": "string", "description": "The customer's phone number." },
                "inquiry_summary": { "type": "string", "description": "A brief summary of what the customer is asking about." }
            },
            "required": ["name", "inquiry_summary"]
        }),
    }
}

/// Function declarations for a chatbot's tool set.
///
/// `WebSearch` contributes nothing here — it is a provider capability flag,
/// not a function declaration.
pub fn declarations_for(specs: &[ToolSpec]) -> Vec<ToolDefinition> {
    let mut declarations = Vec::new();
    for spec in specs {
        match spec {
            ToolSpec::LeadCapture => declarations.push(lead_capture_declaration()),
            ToolSpec::WebSearch => {}
            ToolSpec::Webhook(action) => declarations.push(ToolDefinition {
                name: action.name.clone(),
                description: action.description.clone(),
                parameters: action.parameters.clone(),
            }),
        }
    }
    declarations
}

/// Validate that a tool call has the required arguments.
pub fn validate_args(definition: &ToolDefinition, args: &serde_json::Value) -> Result<(), String> {
    let params = &definition.parameters;
    if let Some(required) = params.get("required").and_then(|r| r.as_array()) {
        for req in required {
            if let Some(key) = req.as_str()
                && args.get(key).is_none()
            {
                return Err(format!("Missing required argument: {key}"));
            }
        }
    }
    Ok(())
}
