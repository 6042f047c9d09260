//! Session bridge error types.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Cannot reach bridge at {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Unknown server '{server}': {message}")]
    InvalidServer { server: String, message: String },

    #[error("Failed to create session for '{server}': {message}")]
    SessionCreateFailed { server: String, message: String },

    #[error("Session {0} no longer exists on the bridge")]
    SessionGone(String),

    #[error("Tool '{tool}' timed out after {}s", timeout.as_secs())]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("Tool '{tool}' failed: {payload}")]
    ToolExecution {
        tool: String,
        payload: serde_json::Value,
    },

    #[error("Bridge returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected bridge response: {0}")]
    Decode(String),
}

impl Error {
    /// Whether the error invalidates the whole conversation rather than a single call.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::SessionGone(_))
    }

    /// Errors scoped to one tool invocation; the model can read them and adapt.
    #[must_use]
    pub fn is_tool_scoped(&self) -> bool {
        !self.is_fatal()
    }
}
