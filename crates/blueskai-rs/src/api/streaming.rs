//! Server-Sent Events (SSE) streaming for the chat completions API.
//!
//! Provides [`ChunkEvent`] and [`OpenAiClient::chat_stream_live`] for
//! receiving incremental text and tool-call deltas off the wire, so the
//! harness can forward text to observers as it arrives.

use super::error::ApiError;
use crate::{ChatRequest, OpenAiClient, UsageInfo};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// A single decoded event from an SSE stream.
#[derive(Debug, Clone)]
pub enum ChunkEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// A tool call chunk (accumulated until complete).
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: String,
    },
    /// Token usage information (sent in the final chunk).
    Usage(UsageInfo),
    /// The model set a finish reason on its choice.
    Finish(String),
    /// An `error` object arrived mid-stream.
    Error(String),
    /// The stream is complete.
    Done,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
    error: Option<StreamError>,
}

#[derive(Deserialize, Debug)]
struct StreamError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
    refusal: Option<String>,
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Deserialize, Debug)]
struct StreamToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunctionDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

impl OpenAiClient {
    /// Send a streaming chat request, invoking `on_event` for each event as
    /// it arrives off the wire.
    ///
    /// The full event list is also returned for post-hoc assembly of text,
    /// tool calls and usage.
    pub async fn chat_stream_live(
        &self,
        body: &ChatRequest,
        mut on_event: impl FnMut(&ChunkEvent),
    ) -> Result<Vec<ChunkEvent>, ApiError> {
        let mut stream_body =
            serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        stream_body["stream"] = serde_json::Value::Bool(true);
        stream_body["stream_options"] = serde_json::json!({ "include_usage": true });

        debug!("Sending live streaming chat request");

        let mut resp = self
            .post(&stream_body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http { status, body });
        }

        let mut events = Vec::new();
        let mut lines = LineBuffer::default();
        let mut done = false;

        // Read chunk by chunk so long responses never need a single-body read.
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read streaming chunk: {e}")))?
        {
            lines.push(&chunk);
            while let Some(line) = lines.next_line() {
                if handle_line(line.trim(), &mut events, &mut on_event) {
                    done = true;
                    break;
                }
            }

            if done {
                break;
            }
        }

        // Incomplete final line.
        if !done {
            let remaining = lines.take_rest();
            handle_line(remaining.trim(), &mut events, &mut on_event);
        }

        if let Some(message) = events.iter().find_map(|e| match e {
            ChunkEvent::Error(m) => Some(m.clone()),
            _ => None,
        }) {
            return Err(ApiError::Api(message));
        }

        if !events.iter().any(|e| matches!(e, ChunkEvent::Done)) {
            let ev = ChunkEvent::Done;
            on_event(&ev);
            events.push(ev);
        }

        debug!("Live stream completed with {} events", events.len());
        Ok(events)
    }
}

/// Byte buffer that yields complete lines. Network chunks can end inside a
/// multibyte character, so bytes are decoded only once a whole line is in.
#[derive(Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn take_rest(&mut self) -> String {
        let rest = std::mem::take(&mut self.bytes);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Handle one SSE line. Returns `true` on the `[DONE]` sentinel.
fn handle_line(
    line: &str,
    events: &mut Vec<ChunkEvent>,
    on_event: &mut impl FnMut(&ChunkEvent),
) -> bool {
    if line.is_empty() || line.starts_with(':') {
        return false;
    }
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        trace!("Ignoring SSE field line: {line}");
        return false;
    };
    if data == "[DONE]" {
        let ev = ChunkEvent::Done;
        on_event(&ev);
        events.push(ev);
        return true;
    }
    let before = events.len();
    parse_sse_data(data, events);
    for ev in &events[before..] {
        on_event(ev);
    }
    false
}

/// Parse a single SSE `data:` payload into chunk events.
pub(crate) fn parse_sse_data(data: &str, events: &mut Vec<ChunkEvent>) {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e}; data: {data}");
            return;
        }
    };

    if let Some(err) = chunk.error {
        events.push(ChunkEvent::Error(err.message));
        return;
    }

    if let Some(usage) = chunk.usage {
        events.push(ChunkEvent::Usage(usage));
    }

    for choice in chunk.choices.unwrap_or_default() {
        if let Some(delta) = choice.delta {
            if let Some(content) = delta.content
                && !content.is_empty()
            {
                events.push(ChunkEvent::TextDelta(content));
            }
            if let Some(refusal) = delta.refusal
                && !refusal.is_empty()
            {
                events.push(ChunkEvent::TextDelta(refusal));
            }
            for tc in delta.tool_calls.unwrap_or_default() {
                let func = tc.function.unwrap_or(StreamFunctionDelta {
                    name: None,
                    arguments: None,
                });
                events.push(ChunkEvent::ToolCallDelta {
                    index: tc.index.unwrap_or(0),
                    id: tc.id,
                    name: func.name,
                    arguments_delta: func.arguments.unwrap_or_default(),
                });
            }
        }
        if let Some(reason) = choice.finish_reason {
            trace!("Stream finish_reason: {reason}");
            events.push(ChunkEvent::Finish(reason));
        }
    }
}

/// Assemble a complete text string from a sequence of chunk events.
pub fn collect_text(events: &[ChunkEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            ChunkEvent::TextDelta(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Extract usage info from chunk events (if present).
pub fn extract_usage(events: &[ChunkEvent]) -> Option<UsageInfo> {
    events.iter().rev().find_map(|e| match e {
        ChunkEvent::Usage(usage) => Some(usage.clone()),
        _ => None,
    })
}

/// The last finish reason seen in the stream.
pub fn extract_finish_reason(events: &[ChunkEvent]) -> Option<String> {
    events.iter().rev().find_map(|e| match e {
        ChunkEvent::Finish(reason) => Some(reason.clone()),
        _ => None,
    })
}
