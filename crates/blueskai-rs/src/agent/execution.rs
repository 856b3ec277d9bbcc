//! Request dispatch and tool execution for one harness round.
//!
//! Called by [`super::harness::Harness::run()`] to send the round's request
//! (streaming or not, with retries) and to execute the tool calls the model
//! asked for.

use super::config::HarnessConfig;
use super::events::{EventHandler, HarnessEvent};
use crate::api::retry::retry_api_call;
use crate::api::streaming::{self, ChunkEvent};
use crate::tools::core::ToolSet;
use crate::{
    CallType, ChatCompletion, ChatRequest, FunctionCallData, Message, OpenAiClient, ToolCall,
    ToolDef,
};
use std::collections::BTreeMap;

// ── Send request ──────────────────────────────────────────────────

/// Build and send the chat completion request, handling streaming vs
/// non-streaming.
pub(crate) async fn send_round_request(
    config: &HarnessConfig,
    client: &OpenAiClient,
    messages: &[Message],
    tools: &Option<Vec<ToolDef>>,
    event_handler: &dyn EventHandler,
) -> Result<ChatCompletion, String> {
    let body = ChatRequest {
        model: config.model.clone(),
        messages: messages.to_vec(),
        max_completion_tokens: config.max_tokens,
        reasoning_effort: config.reasoning_effort,
        tools: tools.clone(),
        parallel_tool_calls: tools.as_ref().map(|_| !config.sequential_tools),
    };

    if !config.streaming {
        return retry_api_call(&config.retry, || client.chat(&body))
            .await
            .map_err(|e| e.to_string());
    }

    let events = retry_api_call(&config.retry, || {
        client.chat_stream_live(&body, |event| {
            if let ChunkEvent::TextDelta(delta) = event {
                event_handler.on_event(&HarnessEvent::TextDelta(delta));
            }
        })
    })
    .await
    .map_err(|e| e.to_string())?;

    let text = streaming::collect_text(&events);
    Ok(ChatCompletion {
        content: (!text.is_empty()).then_some(text),
        tool_calls: assemble_tool_calls_from_stream(&events),
        usage: streaming::extract_usage(&events),
        finish_reason: streaming::extract_finish_reason(&events),
    })
}

// ── Tool execution ────────────────────────────────────────────────

/// Execute the round's tool calls and append one tool result message per
/// call, in the order the model requested them.
///
/// Calls run concurrently unless `sequential_tools` is set; result events
/// are emitted in request order either way.
pub(crate) async fn execute_tool_calls(
    config: &HarnessConfig,
    tools: &ToolSet,
    event_handler: &dyn EventHandler,
    tool_calls: &[ToolCall],
    messages: &mut Vec<Message>,
) {
    for call in tool_calls {
        event_handler.on_event(&HarnessEvent::ToolExecuting {
            name: &call.function.name,
            call_id: &call.id,
            arguments: &call.function.arguments,
        });
    }

    let results: Vec<String> = if config.sequential_tools || tool_calls.len() == 1 {
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            results.push(
                tools
                    .execute(&call.function.name, &call.function.arguments)
                    .await,
            );
        }
        results
    } else {
        let futures = tool_calls
            .iter()
            .map(|call| tools.execute(&call.function.name, &call.function.arguments));
        futures::future::join_all(futures).await
    };

    for (call, result) in tool_calls.iter().zip(results) {
        event_handler.on_event(&HarnessEvent::ToolResult {
            name: &call.function.name,
            call_id: &call.id,
            result: &result,
        });
        messages.push(Message::tool_result(&call.id, result));
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Assemble complete tool calls from streaming `ToolCallDelta` events.
///
/// The first delta for an index carries the id and name; later deltas carry
/// argument fragments. Entries that never received an id or name are
/// dropped.
pub(crate) fn assemble_tool_calls_from_stream(events: &[ChunkEvent]) -> Vec<ToolCall> {
    let mut calls: BTreeMap<usize, (Option<String>, Option<String>, String)> = BTreeMap::new();

    for event in events {
        if let ChunkEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments_delta,
        } = event
        {
            let entry = calls.entry(*index).or_insert((None, None, String::new()));
            if let Some(id) = id {
                entry.0 = Some(id.clone());
            }
            if let Some(name) = name {
                entry.1 = Some(name.clone());
            }
            entry.2.push_str(arguments_delta);
        }
    }

    calls
        .into_values()
        .filter_map(|(id, name, arguments)| {
            Some(ToolCall {
                id: id?,
                call_type: CallType::Function,
                function: FunctionCallData {
                    name: name?,
                    arguments,
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::FnEventHandler;
    use crate::tools::core::{Tool, ToolFuture};
    use std::sync::{Arc, Mutex};

    fn delta(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> ChunkEvent {
        ChunkEvent::ToolCallDelta {
            index,
            id: id.map(Into::into),
            name: name.map(Into::into),
            arguments_delta: args.into(),
        }
    }

    #[test]
    fn assemble_tool_calls_basic() {
        let events = vec![
            delta(0, Some("call_1"), Some("post"), "{\"te"),
            delta(0, None, None, "xt\":\"hi\"}"),
            ChunkEvent::Done,
        ];
        let calls = assemble_tool_calls_from_stream(&events);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "post");
        assert_eq!(calls[0].function.arguments, "{\"text\":\"hi\"}");
    }

    #[test]
    fn assemble_tool_calls_keeps_index_order() {
        let events = vec![
            delta(1, Some("call_b"), Some("search"), "{}"),
            delta(0, Some("call_a"), Some("timeline"), "{}"),
            delta(2, None, None, "{}"),
        ];
        let calls = assemble_tool_calls_from_stream(&events);
        let ids: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);
    }

    fn call(id: &str, name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: args.into(),
            },
        }
    }

    struct WaitTool;

    impl Tool for WaitTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new("wait", "Wait then echo", serde_json::json!({"type": "object"}))
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let args: serde_json::Value = serde_json::from_str(arguments).unwrap_or_default();
            let delay = args["delay_ms"].as_u64().unwrap_or(0);
            let tag = args["tag"].as_str().unwrap_or_default().to_string();
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                tag
            })
        }
    }

    #[tokio::test]
    async fn tool_results_follow_request_order() {
        let tools = ToolSet::new().with(WaitTool);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let handler = FnEventHandler::new(move |event| match event {
            HarnessEvent::ToolExecuting { call_id, .. } => {
                s.lock().unwrap().push(format!("exec {call_id}"))
            }
            HarnessEvent::ToolResult { call_id, result, .. } => {
                s.lock().unwrap().push(format!("done {call_id} {result}"))
            }
            _ => {}
        });

        let calls = vec![
            call("c1", "wait", r#"{"delay_ms": 40, "tag": "slow"}"#),
            call("c2", "wait", r#"{"delay_ms": 0, "tag": "fast"}"#),
        ];
        let mut messages = Vec::new();
        execute_tool_calls(
            &HarnessConfig::default(),
            &tools,
            &handler,
            &calls,
            &mut messages,
        )
        .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["exec c1", "exec c2", "done c1 slow", "done c2 fast"]
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[1].content.as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let tools = ToolSet::new();
        let mut messages = Vec::new();
        execute_tool_calls(
            &HarnessConfig::default(),
            &tools,
            &crate::agent::events::NoopHandler,
            &[call("c1", "missing", "{}")],
            &mut messages,
        )
        .await;
        assert_eq!(
            messages[0].content.as_deref(),
            Some("Error: unknown tool 'missing'")
        );
    }
}
