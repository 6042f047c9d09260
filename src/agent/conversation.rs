use crate::provider::Message;
use uuid::Uuid;

/// Append-only message history for one conversation.
///
/// The whole history is sent to the model on every request.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: Uuid,
    messages: Vec<Message>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }

    /// Start with a system instruction, if one is configured.
    #[must_use]
    pub fn with_system_prompt(prompt: Option<&str>) -> Self {
        let mut conversation = Self::new();
        if let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) {
            conversation.push(Message::system(prompt));
        }
        conversation
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
