//! Conversation types shared by the model client and the dispatch loop.

use crate::tool::ToolCallRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    /// Assistant turn that ended with plain text.
    Assistant {
        content: String,
    },
    /// Assistant turn that asked for tools; `content` may be empty.
    AssistantToolCalls {
        content: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// Normalized result of one tool call.
    Tool {
        tool_name: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } | Self::AssistantToolCalls { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content }
            | Self::AssistantToolCalls { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }
}

/// What the model answered for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// No tool calls; `text` is the answer (possibly empty).
    Final { text: String },
    /// One or more tool calls, optionally with accompanying text.
    ToolCalls {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
}

impl ModelResponse {
    /// Classify a decoded reply. A reply without tool calls is final.
    #[must_use]
    pub fn from_parts(text: String, calls: Vec<ToolCallRequest>) -> Self {
        if calls.is_empty() {
            Self::Final { text }
        } else {
            Self::ToolCalls { text, calls }
        }
    }

    /// The assistant message this response appends to the conversation.
    #[must_use]
    pub fn to_message(&self) -> Message {
        match self {
            Self::Final { text } => Message::Assistant {
                content: text.clone(),
            },
            Self::ToolCalls { text, calls } => Message::AssistantToolCalls {
                content: text.clone(),
                tool_calls: calls.clone(),
            },
        }
    }
}
