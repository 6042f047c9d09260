/// Progress reported while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// About to query the model (1-based within the turn).
    ModelRequest { iteration: usize },
    /// The model asked for this many tool calls.
    ToolCallsRequested(usize),
    ToolCallStart {
        name: String,
        arguments: serde_json::Value,
    },
    ToolCallResult {
        name: String,
        content: String,
        is_error: bool,
    },
    Finished(String),
    IterationCapReached(usize),
}
