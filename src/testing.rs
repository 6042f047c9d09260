//! In-memory doubles for the bridge and the model.

use crate::bridge::{
    BridgeApi, CloseAck, Error as BridgeError, Health, ServerInfo, SessionId, ToolDescriptor,
    ToolResult,
};
use crate::provider::{ChatModel, Error as ModelError, Message, ModelResponse};
use crate::tool::{ModelToolSchema, ToolCallRequest};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn tool(name: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: Some(format!("{name} tool")),
        input_schema: Some(json!({"type": "object", "properties": {}})),
    }
}

pub fn text_result(text: &str) -> ToolResult {
    ToolResult::new(json!({"result": {"content": [{"type": "text", "text": text}]}}))
}

pub fn call(name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::from_wire(name, arguments)
}

pub fn tool_calls(calls: Vec<ToolCallRequest>) -> ModelResponse {
    ModelResponse::ToolCalls {
        text: String::new(),
        calls,
    }
}

pub fn final_text(text: &str) -> ModelResponse {
    ModelResponse::Final {
        text: text.to_string(),
    }
}

#[derive(Default)]
pub struct MockBridge {
    pub tools: Vec<ToolDescriptor>,
    pub create_error: Option<BridgeError>,
    pub list_error: Option<BridgeError>,
    pub close_error: Option<BridgeError>,
    /// Scripted `call_tool` answers, consumed in order.
    pub results: Mutex<VecDeque<Result<ToolResult, BridgeError>>>,
    /// `(tool, arguments)` for every `call_tool`.
    pub calls: Mutex<Vec<(String, Value)>>,
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
}

impl MockBridge {
    pub fn with_tools(names: &[&str]) -> Self {
        Self {
            tools: names.iter().map(|n| tool(n)).collect(),
            ..Self::default()
        }
    }

    pub fn push_result(&self, result: Result<ToolResult, BridgeError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn recorded_calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BridgeApi for MockBridge {
    async fn health(&self) -> Result<Health, BridgeError> {
        Ok(Health {
            active_sessions: self.created().saturating_sub(self.closed()) as u64,
            extra: serde_json::Map::new(),
        })
    }

    async fn list_servers(&self) -> Result<Vec<ServerInfo>, BridgeError> {
        Ok(vec![ServerInfo {
            name: "pentest".into(),
            description: "mock".into(),
        }])
    }

    async fn create_session(&self, _server: &str) -> Result<SessionId, BridgeError> {
        if let Some(err) = &self.create_error {
            return Err(err.clone());
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(SessionId::new(format!("session-{n}")))
    }

    async fn list_tools(&self, _session: &SessionId) -> Result<Vec<ToolDescriptor>, BridgeError> {
        match &self.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.tools.clone()),
        }
    }

    async fn call_tool(
        &self,
        _session: &SessionId,
        name: &str,
        arguments: &Value,
        _timeout: Duration,
    ) -> Result<ToolResult, BridgeError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text_result("ok")))
    }

    async fn session_info(&self, session: &SessionId) -> Result<Value, BridgeError> {
        Ok(json!({"sessionId": session.as_str()}))
    }

    async fn close_session(&self, _session: &SessionId) -> Result<CloseAck, BridgeError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(CloseAck {
                already_closed: false,
                body: Value::Null,
            }),
        }
    }
}

/// Model that replays a script, then repeats `fallback` (or answers "done").
#[derive(Default)]
pub struct ScriptedModel {
    pub script: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    pub fallback: Option<ModelResponse>,
    /// History and tool count seen by every `chat` call.
    pub requests: Mutex<Vec<(Vec<Message>, usize)>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<ModelResponse, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn history(&self, request: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[request].0.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ModelToolSchema],
    ) -> Result<ModelResponse, ModelError> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), tools.len()));
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        Ok(self.fallback.clone().unwrap_or_else(|| final_text("done")))
    }
}
