//! Webhook executor — dispatches caller-defined actions over HTTP.
//!
//! Failures never escape as errors: the model receives a structured
//! `{"error": "..."}` payload as the function result and decides how to
//! react (apologize, rephrase, try again). Retry policy belongs to the
//! model, not the executor.

use std::time::Duration;

use chatforge_core::types::{HttpMethod, WebhookAction};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub struct WebhookExecutor {
    client: reqwest::Client,
}

impl WebhookExecutor {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("ChatForge/1.0")
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Execute an action with the model-supplied arguments.
    ///
    /// GET serializes the arguments as a query string; POST sends them as a
    /// JSON body. Caller-configured headers are applied on top of
    /// `Content-Type: application/json`.
    pub async fn execute(
        &self,
        action: &WebhookAction,
        args: &serde_json::Value,
    ) -> serde_json::Value {
        match self.try_execute(action, args).await {
            Ok(value) => value,
            Err(message) => {
                tracing::warn!(action = %action.name, "webhook execution failed: {message}");
                serde_json::json!({ "error": format!("Action failed: {message}") })
            }
        }
    }

    async fn try_execute(
        &self,
        action: &WebhookAction,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        let mut request = match action.method {
            HttpMethod::Get => {
                let query: Vec<(String, String)> = args
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| (k.clone(), json_value_to_query_string(v)))
                            .collect()
                    })
                    .unwrap_or_default();
                self.client.get(&action.url).query(&query)
            }
            HttpMethod::Post => self
                .client
                .post(&action.url)
                .header("Content-Type", "application/json")
                .json(args),
        };

        for (key, value) in &action.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("HTTP {status}: {}", truncate(&body, 200)));
        }

        // Non-JSON responses are wrapped so the model still sees something.
        Ok(serde_json::from_str(&body)
            .unwrap_or_else(|_| serde_json::json!({ "response": body })))
    }
}

impl Default for WebhookExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn json_value_to_query_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatforge_core::types::HttpMethod;
    use std::collections::HashMap;

    fn action(url: &str, method: HttpMethod) -> WebhookAction {
        WebhookAction {
            name: "test_hook".into(),
            description: "test".into(),
            url: url.into(),
            method,
            headers: HashMap::new(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn test_query_string_values() {
        assert_eq!(
            json_value_to_query_string(&serde_json::json!("plain")),
            "plain"
        );
        assert_eq!(json_value_to_query_string(&serde_json::json!(42)), "42");
        assert_eq!(json_value_to_query_string(&serde_json::json!(true)), "true");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let s = "héllo wörld";
        let t = truncate(s, 2);
        assert!(t.len() <= 2);
        assert!(s.starts_with(t));
    }

    #[tokio::test]
    async fn test_unreachable_host_returns_error_payload() {
        let executor = WebhookExecutor::new();
        // Nothing listens on the discard port: connection refused fast.
        let result = executor
            .execute(
                &action("http://127.0.0.1:9/hook", HttpMethod::Post),
                &serde_json::json!({"k": "v"}),
            )
            .await;
        let message = result["error"].as_str().unwrap();
        assert!(message.starts_with("Action failed:"));
    }
}
