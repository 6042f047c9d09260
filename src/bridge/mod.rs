//! Session bridge client.
//!
//! The bridge is an HTTP service that multiplexes several backend tool servers.
//! Every tool listing or invocation is scoped to a session created for one server.
//!
//! ```ignore
//! let bridge = BridgeClient::new("http://192.168.1.100:3000");
//! let session = bridge.create_session("pentest").await?;
//! let tools = bridge.list_tools(&session).await?;
//! let result = bridge
//!     .call_tool(&session, "nmap_scan", &json!({"target": "10.0.0.1"}), TOOL_TIMEOUT)
//!     .await?;
//! bridge.close_session(&session).await?;
//! ```

mod client;
mod error;
mod types;

pub use client::{BridgeClient, REQUEST_TIMEOUT, TOOL_TIMEOUT};
pub use error::Error;
pub use types::{CloseAck, Health, ServerInfo, SessionId, ToolDescriptor, ToolResult};

use async_trait::async_trait;
use std::time::Duration;

/// Session-scoped operations against the bridge.
///
/// Implemented by [`BridgeClient`]; the dispatch loop and the session lifecycle
/// only depend on this trait.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    async fn health(&self) -> Result<Health, Error>;

    async fn list_servers(&self) -> Result<Vec<ServerInfo>, Error>;

    async fn create_session(&self, server: &str) -> Result<SessionId, Error>;

    /// Returns an empty list when the backend reports no tools.
    async fn list_tools(&self, session: &SessionId) -> Result<Vec<ToolDescriptor>, Error>;

    /// Invoke a tool, waiting at most `timeout` for the backend to answer.
    async fn call_tool(
        &self,
        session: &SessionId,
        name: &str,
        arguments: &serde_json::Value,
        timeout: Duration,
    ) -> Result<ToolResult, Error>;

    async fn session_info(&self, session: &SessionId) -> Result<serde_json::Value, Error>;

    /// Closing a session the bridge no longer knows is not an error.
    async fn close_session(&self, session: &SessionId) -> Result<CloseAck, Error>;
}
