//! HTTP client for the session bridge.

use super::error::Error;
use super::types::{
    CallToolRequest, CloseAck, CreateSessionRequest, CreateSessionResponse, Health, ServerInfo,
    ServersResponse, SessionId, ToolDescriptor, ToolResult,
};
use super::BridgeApi;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default timeout for non-tool bridge requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for a single tool invocation. Scans can run for minutes.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(600);
/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the multi-server session bridge.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `/session/{id}/{suffix}` with the id percent-encoded as one path segment.
    fn session_url(&self, session: &SessionId, suffix: &str) -> Result<Url, Error> {
        let invalid = |message: String| Error::Connection {
            url: self.base_url.clone(),
            message,
        };
        let mut url =
            Url::parse(&self.base_url).map_err(|e| invalid(format!("invalid bridge URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| invalid("bridge URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("session")
            .push(session.as_str())
            .extend(suffix.split('/'));
        Ok(url)
    }

    fn connection_error(&self, err: &reqwest::Error) -> Error {
        Error::Connection {
            url: self.base_url.clone(),
            message: err.to_string(),
        }
    }

    /// Send a request and read the body as text.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), Error> {
        let response = request
            .send()
            .await
            .map_err(|e| self.connection_error(&e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.connection_error(&e))?;
        debug!(status = status.as_u16(), bytes = body.len(), "bridge response");
        Ok((status, body))
    }

    /// Send a request whose success body is JSON; a 404 means the session is gone.
    async fn send_session_json<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        session: &SessionId,
    ) -> Result<R, Error> {
        let (status, body) = self.send(request).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(Error::SessionGone(session.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        decode(&body)
    }
}

fn decode<R: DeserializeOwned>(body: &str) -> Result<R, Error> {
    serde_json::from_str(body).map_err(|e| Error::Decode(format!("{e}: {body}")))
}

/// Parse an error body as JSON when possible so the payload reaches the model intact.
fn error_payload(body: String) -> serde_json::Value {
    serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body))
}

#[async_trait]
impl BridgeApi for BridgeClient {
    async fn health(&self) -> Result<Health, Error> {
        let (status, body) = self.send(self.client.get(self.url("/health"))).await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        decode(&body)
    }

    async fn list_servers(&self) -> Result<Vec<ServerInfo>, Error> {
        let (status, body) = self.send(self.client.get(self.url("/servers"))).await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        let servers: ServersResponse = decode(&body)?;
        Ok(servers.servers)
    }

    async fn create_session(&self, server: &str) -> Result<SessionId, Error> {
        let request = self
            .client
            .post(self.url("/session/create"))
            .json(&CreateSessionRequest { server });
        let (status, body) = self.send(request).await?;

        if status.is_client_error() {
            return Err(Error::InvalidServer {
                server: server.to_string(),
                message: body,
            });
        }
        if !status.is_success() {
            return Err(Error::SessionCreateFailed {
                server: server.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let created: CreateSessionResponse =
            serde_json::from_str(&body).map_err(|e| Error::SessionCreateFailed {
                server: server.to_string(),
                message: format!("{e}: {body}"),
            })?;

        match created.session_id {
            Some(id) if !id.is_empty() => Ok(SessionId::new(id)),
            _ => Err(Error::SessionCreateFailed {
                server: server.to_string(),
                message: format!("response carried no sessionId: {body}"),
            }),
        }
    }

    async fn list_tools(&self, session: &SessionId) -> Result<Vec<ToolDescriptor>, Error> {
        let request = self.client.post(self.session_url(session, "tools/list")?);
        let body: serde_json::Value = self.send_session_json(request, session).await?;

        match body.pointer("/result/tools") {
            Some(serde_json::Value::Array(tools)) => tools
                .iter()
                .map(|t| {
                    serde_json::from_value(t.clone())
                        .map_err(|e| Error::Decode(format!("invalid tool descriptor {t}: {e}")))
                })
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    async fn call_tool(
        &self,
        session: &SessionId,
        name: &str,
        arguments: &serde_json::Value,
        timeout: Duration,
    ) -> Result<ToolResult, Error> {
        let request = self
            .client
            .post(self.session_url(session, "tools/call")?)
            .timeout(timeout)
            .json(&CallToolRequest { name, arguments });

        let timed_out = |e: &reqwest::Error| {
            e.is_timeout().then(|| Error::ToolTimeout {
                tool: name.to_string(),
                timeout,
            })
        };

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return Err(timed_out(&e).unwrap_or_else(|| self.connection_error(&e))),
        };
        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Err(timed_out(&e).unwrap_or_else(|| self.connection_error(&e))),
        };
        debug!(tool = name, status = status.as_u16(), "tool call response");

        if status == StatusCode::NOT_FOUND {
            return Err(Error::SessionGone(session.to_string()));
        }
        if !status.is_success() {
            return Err(Error::ToolExecution {
                tool: name.to_string(),
                payload: error_payload(body),
            });
        }

        decode(&body).map(ToolResult::new)
    }

    async fn session_info(&self, session: &SessionId) -> Result<serde_json::Value, Error> {
        let request = self.client.get(self.session_url(session, "info")?);
        self.send_session_json(request, session).await
    }

    async fn close_session(&self, session: &SessionId) -> Result<CloseAck, Error> {
        let request = self.client.post(self.session_url(session, "close")?);
        let (status, body) = self.send(request).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(CloseAck {
                already_closed: true,
                body: error_payload(body),
            });
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            error_payload(body)
        };
        Ok(CloseAck {
            already_closed: false,
            body,
        })
    }
}
