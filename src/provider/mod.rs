//! Chat model client.
//!
//! The dispatch loop only sees [`ChatModel`]; [`OllamaClient`] is the HTTP
//! implementation used by the CLI.

mod error;
mod ollama;
mod types;

pub use error::{Error, error_message};
pub use ollama::{CHAT_TIMEOUT, DEFAULT_HOST, DEFAULT_MODEL, OllamaClient};
pub use types::*;

use crate::tool::ModelToolSchema;
use async_trait::async_trait;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Cheap reachability probe used before starting a conversation.
    async fn is_available(&self) -> bool {
        true
    }

    /// Send the full history plus available tools, return the assistant's reply.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ModelToolSchema],
    ) -> Result<ModelResponse, Error>;
}
