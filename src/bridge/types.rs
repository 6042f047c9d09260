//! Wire types for the session bridge HTTP contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session identifier issued by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines and status output.
    #[must_use]
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(20) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    #[serde(rename = "activeSessions", default)]
    pub active_sessions: u64,
    /// Anything else the bridge chooses to report.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of `GET /servers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServersResponse {
    #[serde(default)]
    pub servers: Vec<ServerInfo>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub server: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CallToolRequest<'a> {
    pub name: &'a str,
    pub arguments: &'a serde_json::Value,
}

/// A tool advertised by the backend server behind a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "inputSchema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_schema: Option<serde_json::Value>,
}

/// Raw `tools/call` response. Kept as JSON; see [`crate::tool::normalize_result`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub raw: serde_json::Value,
}

impl ToolResult {
    #[must_use]
    pub fn new(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    /// MCP servers flag tool-level failures with `result.isError`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.raw
            .pointer("/result/isError")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Acknowledgment from `POST /session/{id}/close`.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseAck {
    /// The bridge no longer knew the session.
    pub already_closed: bool,
    pub body: serde_json::Value,
}
