//! Tool-call plumbing between the model and the bridge.
//!
//! Three pure steps live here: descriptor → model schema, wire arguments →
//! structured arguments, and raw backend response → plain text.

pub mod types;

pub use types::*;

use crate::bridge::ToolDescriptor;
use serde_json::{Map, Value, json};

/// Schema used when a descriptor carries no input schema.
fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Convert bridge tool descriptors into the model's function-calling format.
#[must_use]
pub fn to_model_schemas(tools: &[ToolDescriptor]) -> Vec<ModelToolSchema> {
    tools
        .iter()
        .map(|tool| ModelToolSchema {
            kind: "function".to_string(),
            function: FunctionSchema {
                name: tool.name.clone(),
                description: tool.description.clone().unwrap_or_default(),
                parameters: tool
                    .input_schema
                    .clone()
                    .filter(|s| !s.is_null())
                    .unwrap_or_else(empty_object_schema),
            },
        })
        .collect()
}

/// Parse tool-call arguments that may arrive pre-structured or JSON-encoded.
///
/// Objects pass through unchanged, strings are decoded once, and `null` or an
/// empty string means "no arguments".
pub fn parse_arguments(value: Value) -> Result<Map<String, Value>, String> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(raw) => {
            if raw.trim().is_empty() {
                return Ok(Map::new());
            }
            match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(Value::Null) => Ok(Map::new()),
                Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
                Err(e) => Err(format!("invalid JSON: {e}")),
            }
        }
        other => Err(format!("expected a JSON object, got {}", json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl ToolArguments {
    #[must_use]
    pub fn from_wire(value: Value) -> Self {
        let raw = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match parse_arguments(value) {
            Ok(map) => Self::Parsed(map),
            Err(reason) => Self::Malformed { raw, reason },
        }
    }

    /// Form echoed back to the model in the assistant's tool-call history.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Parsed(map) => Value::Object(map.clone()),
            Self::Malformed { raw, .. } => Value::String(raw.clone()),
        }
    }
}

/// Flatten a raw `tools/call` response into the text the model reads.
///
/// With a `result.content` array, the `text` of every item is joined with
/// newlines (items without `text` contribute their JSON form). Anything else
/// is passed on as the serialized response.
#[must_use]
pub fn normalize_result(raw: &Value) -> String {
    let Some(result) = raw.get("result") else {
        return raw.to_string();
    };

    match result.get("content").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => raw.to_string(),
    }
}
