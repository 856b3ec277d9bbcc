//! Turn stream events into human-readable progress lines.

use super::stream::{RunItem, StreamEvent, text_message_output};
use std::fmt;
use tracing::info;

/// A stream event worth showing to a person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedEvent {
    AgentSwitched(String),
    ToolCalled,
    ToolOutput(String),
    MessageOutput(String),
}

impl fmt::Display for RenderedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderedEvent::AgentSwitched(name) => write!(f, "agent switched to {name}"),
            RenderedEvent::ToolCalled => f.write_str("tool was called"),
            RenderedEvent::ToolOutput(output) => write!(f, "tool output: {output}"),
            RenderedEvent::MessageOutput(text) => write!(f, "message output:\n{text}"),
        }
    }
}

/// Classify one stream event. Raw deltas and anything unrecognized are
/// dropped.
pub fn classify(event: &StreamEvent) -> Option<RenderedEvent> {
    match event {
        StreamEvent::RawResponse { .. } | StreamEvent::Unknown => None,
        StreamEvent::AgentUpdated { name } => Some(RenderedEvent::AgentSwitched(name.clone())),
        StreamEvent::RunItem { item } => match item {
            RunItem::ToolCall { .. } => Some(RenderedEvent::ToolCalled),
            RunItem::ToolCallOutput { output, .. } => {
                Some(RenderedEvent::ToolOutput(output.clone()))
            }
            RunItem::MessageOutput { content } => {
                Some(RenderedEvent::MessageOutput(text_message_output(content)))
            }
            RunItem::Reasoning { .. } | RunItem::Unknown => None,
        },
    }
}

/// Destination for rendered progress lines.
pub trait RenderSink: Send + Sync {
    fn render(&self, event: &RenderedEvent);
}

impl<F> RenderSink for F
where
    F: Fn(&RenderedEvent) + Send + Sync,
{
    fn render(&self, event: &RenderedEvent) {
        self(event)
    }
}

/// Writes each rendered event as an info log line.
pub struct LogSink;

impl RenderSink for LogSink {
    fn render(&self, event: &RenderedEvent) {
        info!("-- {event}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::stream::ContentPart;
    use std::sync::Mutex;

    fn item(item: RunItem) -> StreamEvent {
        StreamEvent::RunItem { item }
    }

    #[test]
    fn classifies_each_kind() {
        assert_eq!(
            classify(&StreamEvent::AgentUpdated {
                name: "Processor".into()
            }),
            Some(RenderedEvent::AgentSwitched("Processor".into()))
        );
        assert_eq!(
            classify(&item(RunItem::ToolCall {
                call_id: "c1".into(),
                name: "post".into(),
                arguments: "{}".into(),
            })),
            Some(RenderedEvent::ToolCalled)
        );
        assert_eq!(
            classify(&item(RunItem::ToolCallOutput {
                call_id: "c1".into(),
                output: "42".into(),
            })),
            Some(RenderedEvent::ToolOutput("42".into()))
        );
        assert_eq!(
            classify(&item(RunItem::MessageOutput {
                content: vec![
                    ContentPart::OutputText { text: "Hi ".into() },
                    ContentPart::OutputText {
                        text: "there".into()
                    },
                ],
            })),
            Some(RenderedEvent::MessageOutput("Hi there".into()))
        );
    }

    #[test]
    fn ignores_raw_reasoning_and_unknown() {
        assert_eq!(
            classify(&StreamEvent::RawResponse { delta: "x".into() }),
            None
        );
        assert_eq!(classify(&StreamEvent::Unknown), None);
        assert_eq!(
            classify(&item(RunItem::Reasoning {
                text: "thinking".into()
            })),
            None
        );
        assert_eq!(classify(&item(RunItem::Unknown)), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(
            RenderedEvent::AgentSwitched("A".into()).to_string(),
            "agent switched to A"
        );
        assert_eq!(RenderedEvent::ToolCalled.to_string(), "tool was called");
        assert_eq!(
            RenderedEvent::ToolOutput("ok".into()).to_string(),
            "tool output: ok"
        );
        assert_eq!(
            RenderedEvent::MessageOutput("done".into()).to_string(),
            "message output:\ndone"
        );
    }

    #[test]
    fn closures_are_sinks() {
        let lines = Mutex::new(Vec::new());
        let sink = |event: &RenderedEvent| lines.lock().unwrap().push(event.to_string());
        sink.render(&RenderedEvent::ToolCalled);
        LogSink.render(&RenderedEvent::ToolCalled);
        assert_eq!(*lines.lock().unwrap(), vec!["tool was called"]);
    }
}
