//! Streamed runs: the events a run produces while it is in flight.
//!
//! A [`RunStream`] yields [`StreamEvent`]s in arrival order and ends either
//! after the last event of a successful run or with a single `Err` carrying
//! the failure. The event types are closed tagged unions with an explicit
//! `Unknown` arm, so producers can add kinds without breaking consumers.

use super::events::{EventHandler, HarnessEvent};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One event of a streamed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental model output. Fine-grained; consumers usually skip it.
    RawResponse { delta: String },
    /// The agent handling the run changed (or was set at start).
    AgentUpdated { name: String },
    /// A semantic step of the run.
    RunItem { item: RunItem },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunItem {
    ToolCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    ToolCallOutput {
        call_id: String,
        output: String,
    },
    MessageOutput {
        content: Vec<ContentPart>,
    },
    Reasoning {
        text: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Unknown,
}

/// Concatenate the `output_text` parts of a message, skipping everything
/// else.
pub fn text_message_output(content: &[ContentPart]) -> String {
    content
        .iter()
        .filter_map(|part| match part {
            ContentPart::OutputText { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Live, single-pass event stream of one run.
pub type RunStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, String>> + Send>>;

/// Sending half handed to a run driver.
pub type EventSender = mpsc::UnboundedSender<Result<StreamEvent, String>>;

/// A run driven by a spawned task, read through a channel.
///
/// Dropping the stream aborts the task.
pub struct StreamedRun {
    events: mpsc::UnboundedReceiver<Result<StreamEvent, String>>,
    task: JoinHandle<()>,
}

impl StreamedRun {
    /// Spawn `driver` on the runtime. The stream ends when the driver
    /// returns and its sender is dropped.
    pub fn spawn<F, Fut>(driver: F) -> Self
    where
        F: FnOnce(EventSender) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(driver(tx));
        Self { events, task }
    }
}

impl Stream for StreamedRun {
    type Item = Result<StreamEvent, String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for StreamedRun {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Event handler that turns harness events into [`StreamEvent`]s.
pub struct StreamForwarder {
    tx: EventSender,
}

impl StreamForwarder {
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }

    fn send(&self, event: StreamEvent) {
        // A closed channel means the consumer is gone; the task is about to
        // be aborted.
        let _ = self.tx.send(Ok(event));
    }
}

impl EventHandler for StreamForwarder {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        match event {
            HarnessEvent::AgentStarted { name } => self.send(StreamEvent::AgentUpdated {
                name: name.to_string(),
            }),
            HarnessEvent::TextDelta(delta) => self.send(StreamEvent::RawResponse {
                delta: delta.to_string(),
            }),
            HarnessEvent::Text(text) => self.send(StreamEvent::RunItem {
                item: RunItem::MessageOutput {
                    content: vec![ContentPart::OutputText {
                        text: text.to_string(),
                    }],
                },
            }),
            HarnessEvent::ToolExecuting {
                name,
                call_id,
                arguments,
            } => self.send(StreamEvent::RunItem {
                item: RunItem::ToolCall {
                    call_id: call_id.to_string(),
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }),
            HarnessEvent::ToolResult {
                call_id, result, ..
            } => self.send(StreamEvent::RunItem {
                item: RunItem::ToolCallOutput {
                    call_id: call_id.to_string(),
                    output: result.to_string(),
                },
            }),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn unknown_tags_deserialize_to_unknown() {
        let event: StreamEvent =
            serde_json::from_value(json!({"type": "handoff_requested", "to": "x"})).unwrap();
        assert_eq!(event, StreamEvent::Unknown);

        let event: StreamEvent = serde_json::from_value(json!({
            "type": "run_item",
            "item": {"type": "mcp_list_tools", "server": "bsky"}
        }))
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::RunItem {
                item: RunItem::Unknown
            }
        );
    }

    #[test]
    fn message_output_concatenates_output_text_only() {
        let content = vec![
            ContentPart::OutputText {
                text: "Hello, ".into(),
            },
            ContentPart::Refusal {
                refusal: "no".into(),
            },
            ContentPart::Unknown,
            ContentPart::OutputText {
                text: "world".into(),
            },
        ];
        assert_eq!(text_message_output(&content), "Hello, world");
    }

    #[test]
    fn event_wire_shape() {
        let event = StreamEvent::RunItem {
            item: RunItem::ToolCallOutput {
                call_id: "c1".into(),
                output: "42".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "run_item", "item": {"type": "tool_call_output", "call_id": "c1", "output": "42"}})
        );
    }

    #[tokio::test]
    async fn forwarder_maps_harness_events_in_order() {
        let mut run = StreamedRun::spawn(|tx| async move {
            let forwarder = StreamForwarder::new(tx);
            forwarder.on_event(&HarnessEvent::AgentStarted { name: "Processor" });
            forwarder.on_event(&HarnessEvent::RoundStart {
                round: 1,
                max_rounds: 20,
            });
            forwarder.on_event(&HarnessEvent::ToolExecuting {
                name: "post",
                call_id: "c1",
                arguments: "{}",
            });
            forwarder.on_event(&HarnessEvent::ToolResult {
                name: "post",
                call_id: "c1",
                result: "ok",
            });
            forwarder.on_event(&HarnessEvent::Text("bye"));
        });

        let mut events = Vec::new();
        while let Some(event) = run.next().await {
            events.push(event.unwrap());
        }
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            StreamEvent::AgentUpdated {
                name: "Processor".into()
            }
        );
        assert!(matches!(
            &events[1],
            StreamEvent::RunItem { item: RunItem::ToolCall { name, .. } } if name == "post"
        ));
        assert!(matches!(
            &events[2],
            StreamEvent::RunItem { item: RunItem::ToolCallOutput { output, .. } } if output == "ok"
        ));
        assert!(matches!(
            &events[3],
            StreamEvent::RunItem { item: RunItem::MessageOutput { .. } }
        ));
    }

    #[tokio::test]
    async fn dropping_the_stream_aborts_the_driver() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let run = StreamedRun::spawn(|_tx| async move {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            let _ = done_tx.send(());
        });
        drop(run);
        // The sender is dropped without sending when the task is aborted.
        assert!(done_rx.await.is_err());
    }
}
