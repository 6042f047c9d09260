//! Ollama chat client.
//!
//! Talks to the native `/api/chat` endpoint with `stream: false`, which
//! returns one message per request with optional `tool_calls`.

use super::error::error_message;
use super::{ChatModel, Error, Message, ModelResponse};
use crate::tool::{ModelToolSchema, ToolArguments, ToolCallRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5:7b";
/// Per-request deadline for a chat call.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Stands in for the name of a tool call the model sent without one.
const UNNAMED_TOOL: &str = "<unnamed>";

pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    tools: &'a [ModelToolSchema],
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<serde_json::Value>>,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeout(host, model, CHAT_TIMEOUT)
    }

    pub fn with_timeout(
        host: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.host)
    }

    fn map_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| {
                let (tool_calls, tool_name) = match m {
                    Message::AssistantToolCalls { tool_calls, .. } => (
                        tool_calls
                            .iter()
                            .map(|call| WireToolCall {
                                function: WireFunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.to_wire(),
                                },
                            })
                            .collect(),
                        None,
                    ),
                    Message::Tool { tool_name, .. } => (Vec::new(), Some(tool_name.clone())),
                    _ => (Vec::new(), None),
                };

                WireMessage {
                    role: m.role().as_str(),
                    content: m.content().to_string(),
                    tool_calls,
                    tool_name,
                }
            })
            .collect()
    }

    fn parse_response(body: &str) -> Result<ModelResponse, Error> {
        let response: ChatResponse =
            serde_json::from_str(body).map_err(|e| Error::Decode(format!("{e}: {body}")))?;
        let message = response.message.unwrap_or_default();

        let calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let name = tc.pointer("/function/name").and_then(|n| n.as_str());
                let Some(name) = name else {
                    warn!("Tool call without a function name: {tc}");
                    return ToolCallRequest {
                        name: UNNAMED_TOOL.to_string(),
                        arguments: ToolArguments::Malformed {
                            raw: tc.to_string(),
                            reason: "tool call has no function name".to_string(),
                        },
                    };
                };
                let arguments = tc
                    .pointer("/function/arguments")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                ToolCallRequest::from_wire(name, arguments)
            })
            .collect();

        Ok(ModelResponse::from_parts(
            message.content.unwrap_or_default(),
            calls,
        ))
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Unavailable {
                url: self.host.clone(),
                message: err.to_string(),
            }
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_MODEL)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(&self.host)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ModelToolSchema],
    ) -> Result<ModelResponse, Error> {
        let request = ChatRequest {
            model: &self.model,
            messages: Self::map_messages(messages),
            tools,
            stream: false,
        };
        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "chat request"
        );

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Self::parse_response(&body)
    }
}
