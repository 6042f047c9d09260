//! Session lifecycle.
//!
//! A conversation owns exactly one bridge session. [`with_session`] opens it,
//! prefetches the tool list, runs the conversation, and closes it on every
//! exit path. Dropping the scope mid-flight (Ctrl-C) still closes it: the
//! guard schedules the close on the running Tokio runtime.

use crate::bridge::{BridgeApi, Error as BridgeError, SessionId, ToolDescriptor, ToolResult};
use crate::tool::{ModelToolSchema, to_model_schemas};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

struct Inner {
    api: Arc<dyn BridgeApi>,
    id: SessionId,
    server: String,
    tools: Vec<ToolDescriptor>,
    schemas: Vec<ModelToolSchema>,
    released: AtomicBool,
}

/// Cheap, cloneable view of an open session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl SessionHandle {
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    #[must_use]
    pub fn server(&self) -> &str {
        &self.inner.server
    }

    /// Tool descriptors fetched when the session was opened.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.inner.tools
    }

    #[must_use]
    pub fn tool_schemas(&self) -> &[ModelToolSchema] {
        &self.inner.schemas
    }

    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.inner.tools.iter().any(|t| t.name == name)
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        timeout: Duration,
    ) -> Result<ToolResult, BridgeError> {
        if self.is_released() {
            return Err(BridgeError::SessionGone(self.inner.id.to_string()));
        }
        self.inner
            .api
            .call_tool(&self.inner.id, name, arguments, timeout)
            .await
    }

    pub async fn info(&self) -> Result<serde_json::Value, BridgeError> {
        self.inner.api.session_info(&self.inner.id).await
    }
}

/// Owns the release obligation for one session.
pub struct SessionGuard {
    handle: SessionHandle,
}

impl SessionGuard {
    /// Create a session on `server` and prefetch its tools.
    ///
    /// If the tool listing fails the fresh session is closed before the error
    /// is returned.
    pub async fn open(api: Arc<dyn BridgeApi>, server: &str) -> Result<Self, BridgeError> {
        let id = api.create_session(server).await?;
        info!(session = id.short(), server, "Session created");

        let tools = match api.list_tools(&id).await {
            Ok(tools) => tools,
            Err(e) => {
                close_logged(api.as_ref(), &id).await;
                return Err(e);
            }
        };
        info!(session = id.short(), count = tools.len(), "Tools fetched");

        let schemas = to_model_schemas(&tools);
        Ok(Self {
            handle: SessionHandle {
                inner: Arc::new(Inner {
                    api,
                    id,
                    server: server.to_string(),
                    tools,
                    schemas,
                    released: AtomicBool::new(false),
                }),
            },
        })
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Close the session. Failures are logged, never returned.
    pub async fn release(self) {
        let inner = &self.handle.inner;
        if inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        close_logged(inner.api.as_ref(), &inner.id).await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let inner = &self.handle.inner;
        if inner.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let api = inner.api.clone();
        let id = inner.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(session = id.short(), "Session dropped without release, closing");
                runtime.spawn(async move {
                    close_logged(api.as_ref(), &id).await;
                });
            }
            Err(_) => {
                warn!(session = id.short(), "No runtime to close session; it will leak");
            }
        }
    }
}

async fn close_logged(api: &dyn BridgeApi, id: &SessionId) {
    match api.close_session(id).await {
        Ok(ack) if ack.already_closed => {
            info!(session = id.short(), "Session was already closed")
        }
        Ok(_) => info!(session = id.short(), "Session closed"),
        Err(e) => warn!(session = id.short(), "Failed to close session: {e}"),
    }
}

/// Run `body` against a fresh session on `server`, closing it exactly once afterwards.
///
/// Errors from `body` are returned unchanged; a close failure never replaces them.
pub async fn with_session<T, E, F, Fut>(
    api: Arc<dyn BridgeApi>,
    server: &str,
    body: F,
) -> Result<T, E>
where
    F: FnOnce(SessionHandle) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<BridgeError>,
{
    let guard = SessionGuard::open(api, server).await?;
    let outcome = body(guard.handle()).await;
    guard.release().await;
    outcome
}
