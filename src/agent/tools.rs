use super::{AgentEvent, Conversation};
use crate::bridge::Error as BridgeError;
use crate::provider::Message;
use crate::session::SessionHandle;
use crate::tool::{ToolArguments, ToolCallRequest, ToolError, normalize_result};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Why a single call produced no backend result.
enum CallFailure {
    Tool(ToolError),
    Bridge(BridgeError),
}

/// Run the calls one after another, appending one tool message per call in
/// request order.
///
/// Tool-scoped failures become error messages the model can read. A fatal
/// bridge error stops execution: the failing call and every call after it
/// still get a tool message, then the error is returned.
pub(crate) async fn execute_tool_calls(
    session: &SessionHandle,
    calls: Vec<ToolCallRequest>,
    timeout: Duration,
    conversation: &mut Conversation,
    tx: &mpsc::Sender<AgentEvent>,
) -> Result<(), BridgeError> {
    let mut fatal: Option<BridgeError> = None;

    for call in calls {
        if let Some(err) = &fatal {
            conversation.push(Message::Tool {
                tool_name: call.name,
                content: format!("Error: not executed, {err}"),
                is_error: true,
            });
            continue;
        }

        let _ = tx
            .send(AgentEvent::ToolCallStart {
                name: call.name.clone(),
                arguments: call.arguments.to_wire(),
            })
            .await;

        let (content, is_error) = match dispatch(session, &call, timeout).await {
            Ok((content, is_error)) => (content, is_error),
            Err(CallFailure::Tool(e)) => {
                warn!(tool = %call.name, "Rejected tool call: {e}");
                (format!("Error: {e}"), true)
            }
            Err(CallFailure::Bridge(e)) => {
                warn!(tool = %call.name, "Tool call failed: {e}");
                let content = format!("Error: {e}");
                if e.is_fatal() {
                    fatal = Some(e);
                }
                (content, true)
            }
        };

        let _ = tx
            .send(AgentEvent::ToolCallResult {
                name: call.name.clone(),
                content: content.clone(),
                is_error,
            })
            .await;

        conversation.push(Message::Tool {
            tool_name: call.name,
            content,
            is_error,
        });
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn dispatch(
    session: &SessionHandle,
    call: &ToolCallRequest,
    timeout: Duration,
) -> Result<(String, bool), CallFailure> {
    let arguments = match &call.arguments {
        ToolArguments::Parsed(map) => Value::Object(map.clone()),
        ToolArguments::Malformed { reason, .. } => {
            return Err(CallFailure::Tool(ToolError::MalformedArguments {
                tool: call.name.clone(),
                reason: reason.clone(),
            }));
        }
    };

    if !session.has_tool(&call.name) {
        return Err(CallFailure::Tool(ToolError::UnknownTool(call.name.clone())));
    }

    debug!(tool = %call.name, %arguments, "Calling tool");
    let result = session
        .call_tool(&call.name, &arguments, timeout)
        .await
        .map_err(CallFailure::Bridge)?;

    Ok((normalize_result(&result.raw), result.is_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionGuard;
    use crate::testing::{MockBridge, call, text_result};
    use serde_json::json;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(600);

    async fn run(
        bridge: &Arc<MockBridge>,
        calls: Vec<ToolCallRequest>,
    ) -> (Conversation, Result<(), BridgeError>) {
        let guard = SessionGuard::open(bridge.clone(), "pentest").await.unwrap();
        let (tx, _rx) = mpsc::channel(100);
        let mut conversation = Conversation::new();
        let result =
            execute_tool_calls(&guard.handle(), calls, TIMEOUT, &mut conversation, &tx).await;
        guard.release().await;
        (conversation, result)
    }

    fn tool_message(message: &Message) -> (&str, &str, bool) {
        match message {
            Message::Tool {
                tool_name,
                content,
                is_error,
            } => (tool_name, content, *is_error),
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_results_in_request_order() {
        let bridge = Arc::new(MockBridge::with_tools(&["nmap_scan", "whois", "dig"]));
        bridge.push_result(Ok(text_result("first")));
        bridge.push_result(Ok(text_result("second")));
        bridge.push_result(Ok(text_result("third")));

        let (conversation, result) = run(
            &bridge,
            vec![
                call("nmap_scan", json!({"target": "10.0.0.1"})),
                call("whois", json!("{\"domain\": \"example.com\"}")),
                call("dig", json!({})),
            ],
        )
        .await;

        assert!(result.is_ok());
        let contents: Vec<_> = conversation
            .messages()
            .iter()
            .map(|m| tool_message(m).1.to_string())
            .collect();
        assert_eq!(contents, ["first", "second", "third"]);

        let names: Vec<_> = bridge.recorded_calls().into_iter().map(|c| c.0).collect();
        assert_eq!(names, ["nmap_scan", "whois", "dig"]);
        assert_eq!(
            bridge.recorded_calls()[1].1,
            json!({"domain": "example.com"})
        );
    }

    #[tokio::test]
    async fn test_malformed_arguments_become_tool_message() {
        let bridge = Arc::new(MockBridge::with_tools(&["nmap_scan"]));
        let (conversation, result) =
            run(&bridge, vec![call("nmap_scan", json!("{target: 10.0.0.1"))]).await;

        assert!(result.is_ok());
        let (name, content, is_error) = tool_message(&conversation.messages()[0]);
        assert_eq!(name, "nmap_scan");
        assert!(is_error);
        assert!(content.starts_with("Error: Malformed arguments for 'nmap_scan'"));
        assert!(bridge.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_nameless_call_becomes_tool_message() {
        let bridge = Arc::new(MockBridge::with_tools(&["nmap_scan"]));
        let nameless = ToolCallRequest {
            name: "<unnamed>".into(),
            arguments: ToolArguments::Malformed {
                raw: json!({"type": "function"}).to_string(),
                reason: "tool call has no function name".into(),
            },
        };
        let (conversation, result) =
            run(&bridge, vec![nameless, call("nmap_scan", json!({}))]).await;

        assert!(result.is_ok());
        assert_eq!(conversation.len(), 2);
        let (_, content, is_error) = tool_message(&conversation.messages()[0]);
        assert!(is_error);
        assert_eq!(
            content,
            "Error: Malformed arguments for '<unnamed>': tool call has no function name"
        );
        assert_eq!(bridge.recorded_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_tool_message() {
        let bridge = Arc::new(MockBridge::with_tools(&["nmap_scan"]));
        let (conversation, result) = run(&bridge, vec![call("sqlmap", json!({}))]).await;

        assert!(result.is_ok());
        let (_, content, is_error) = tool_message(&conversation.messages()[0]);
        assert!(is_error);
        assert_eq!(content, "Error: Unknown tool 'sqlmap'");
    }

    #[tokio::test]
    async fn test_timeout_is_recovered() {
        let bridge = Arc::new(MockBridge::with_tools(&["nmap_scan", "whois"]));
        bridge.push_result(Err(BridgeError::ToolTimeout {
            tool: "nmap_scan".into(),
            timeout: TIMEOUT,
        }));
        bridge.push_result(Ok(text_result("registrar: x")));

        let (conversation, result) = run(
            &bridge,
            vec![call("nmap_scan", json!({})), call("whois", json!({}))],
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(conversation.len(), 2);
        let (_, content, is_error) = tool_message(&conversation.messages()[0]);
        assert!(is_error);
        assert!(content.contains("timed out after 600s"));
        assert_eq!(tool_message(&conversation.messages()[1]).1, "registrar: x");
    }

    #[tokio::test]
    async fn test_backend_error_flag() {
        let bridge = Arc::new(MockBridge::with_tools(&["nikto"]));
        bridge.push_result(Ok(crate::bridge::ToolResult::new(json!({
            "result": {"content": [{"text": "nikto: command not found"}], "isError": true}
        }))));

        let (conversation, _) = run(&bridge, vec![call("nikto", json!({}))]).await;
        assert_eq!(
            tool_message(&conversation.messages()[0]),
            ("nikto", "nikto: command not found", true)
        );
    }

    #[tokio::test]
    async fn test_fatal_error_keeps_one_message_per_call() {
        let bridge = Arc::new(MockBridge::with_tools(&["nmap_scan", "whois"]));
        bridge.push_result(Err(BridgeError::Connection {
            url: "http://bridge".into(),
            message: "connection reset".into(),
        }));

        let (conversation, result) = run(
            &bridge,
            vec![call("nmap_scan", json!({})), call("whois", json!({}))],
        )
        .await;

        assert!(matches!(result, Err(BridgeError::Connection { .. })));
        assert_eq!(conversation.len(), 2);
        assert!(tool_message(&conversation.messages()[1]).1.contains("not executed"));
        assert_eq!(bridge.recorded_calls().len(), 1);
    }
}
