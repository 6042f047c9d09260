use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Function-calling schema entry sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Arguments of a tool call after the one-time parse-if-string step.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    Parsed(serde_json::Map<String, serde_json::Value>),
    /// The model sent something that does not decode to a JSON object.
    Malformed { raw: String, reason: String },
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    /// Build a request from the wire form, normalizing its arguments.
    pub fn from_wire(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments: ToolArguments::from_wire(arguments),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("Malformed arguments for '{tool}': {reason}")]
    MalformedArguments { tool: String, reason: String },

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
}
