//! Model client error types.

use std::time::Duration;
use thiserror::Error;

/// Pull a readable message out of an error body.
///
/// Ollama answers `{"error": "..."}`; OpenAI-style gateways in front of it
/// answer `{"error": {"message": "...", "code": "..."}}`. Anything else is
/// returned trimmed.
#[must_use]
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .unwrap_or_else(|| body.trim().to_string())
}

fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    if let Some(error) = json.get("error") {
        if let Some(msg) = error.as_str() {
            return Some(msg.to_string());
        }
        if let Some(msg) = error.get("message").and_then(|v| v.as_str()) {
            return Some(match error.get("code").and_then(|v| v.as_str()) {
                Some(code) => format!("{msg} (code: {code})"),
                None => msg.to_string(),
            });
        }
    }

    json.get("message")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Model endpoint unavailable at {url}: {message}")]
    Unavailable { url: String, message: String },

    #[error("Model did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Model API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected model response: {0}")]
    Decode(String),
}
