//! The dispatch loop.
//!
//! One user turn moves through `AwaitingModel ⇄ ExecutingTools` until the
//! model answers without tool calls (`Done`), the iteration cap is hit, or an
//! unrecoverable error aborts the turn (`Failed`).

mod conversation;
mod events;
mod outcome;
mod tools;

pub use conversation::Conversation;
pub use events::AgentEvent;
pub use outcome::{TurnError, TurnOutcome};

use crate::bridge::TOOL_TIMEOUT;
use crate::provider::{ChatModel, Message, ModelResponse};
use crate::session::SessionHandle;
use crate::tool::ToolCallRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Model round-trips allowed per user turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCallRequest>),
    Done(String),
    Failed(TurnError),
}

#[derive(Clone)]
pub struct Agent {
    model: Arc<dyn ChatModel>,
    max_iterations: usize,
    tool_timeout: Duration,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: TOOL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[must_use]
    pub fn model(&self) -> Arc<dyn ChatModel> {
        self.model.clone()
    }

    /// Run one user turn to completion.
    ///
    /// The user message and everything the turn produces are appended to
    /// `conversation`, including on failure. Events go to `tx`; a dropped
    /// receiver is ignored, but a live one must be drained.
    pub async fn run_turn(
        &self,
        session: &SessionHandle,
        conversation: &mut Conversation,
        user_input: &str,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<TurnOutcome, TurnError> {
        conversation.push(Message::user(user_input));

        let mut iterations = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.max_iterations {
                        warn!(iterations, "Iteration cap reached without a final answer");
                        let _ = tx.send(AgentEvent::IterationCapReached(iterations)).await;
                        return Ok(TurnOutcome::IterationCapReached { iterations });
                    }
                    iterations += 1;
                    let _ = tx.send(AgentEvent::ModelRequest { iteration: iterations }).await;

                    match self
                        .model
                        .chat(conversation.messages(), session.tool_schemas())
                        .await
                    {
                        Ok(response) => {
                            conversation.push(response.to_message());
                            match response {
                                ModelResponse::Final { text } => LoopState::Done(text),
                                ModelResponse::ToolCalls { calls, .. } => {
                                    let _ = tx.send(AgentEvent::ToolCallsRequested(calls.len())).await;
                                    LoopState::ExecutingTools(calls)
                                }
                            }
                        }
                        Err(e) => LoopState::Failed(e.into()),
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    debug!(count = calls.len(), iteration = iterations, "Executing tool calls");
                    match tools::execute_tool_calls(
                        session,
                        calls,
                        self.tool_timeout,
                        conversation,
                        tx,
                    )
                    .await
                    {
                        Ok(()) => LoopState::AwaitingModel,
                        Err(e) => LoopState::Failed(e.into()),
                    }
                }
                LoopState::Done(text) => {
                    info!(iterations, "Turn finished");
                    let _ = tx.send(AgentEvent::Finished(text.clone())).await;
                    return Ok(TurnOutcome::Done { text, iterations });
                }
                LoopState::Failed(err) => {
                    warn!(iterations, fatal = err.is_fatal(), "Turn failed: {err}");
                    return Err(err);
                }
            };
        }
    }
}
