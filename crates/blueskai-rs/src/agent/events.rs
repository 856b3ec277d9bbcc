//! Events, handlers, and run results for the [`Harness`](super::harness::Harness).
//!
//! The harness reports its lifecycle through [`HarnessEvent`] variants, from
//! agent start through tool execution to completion. Callers implement
//! [`EventHandler`] to observe them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | [`StreamForwarder`](super::stream::StreamForwarder) | Turn events into a run stream |

use crate::Message;
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the harness during a run.
#[derive(Debug)]
pub enum HarnessEvent<'a> {
    /// The run is starting with this agent.
    AgentStarted { name: &'a str },
    /// A new round is starting.
    RoundStart { round: u32, max_rounds: u32 },
    /// Incremental text content delta (streaming mode only).
    TextDelta(&'a str),
    /// The model returned text (may be alongside tool calls).
    Text(&'a str),
    /// The model is requesting tool calls this round.
    ToolCallsReceived { round: u32, count: usize },
    /// A single tool is about to be executed.
    ToolExecuting {
        name: &'a str,
        call_id: &'a str,
        arguments: &'a str,
    },
    /// A single tool finished executing.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// Token usage reported by the API for this round.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// The agent finished (no more tool calls).
    Finished,
    /// The API returned an empty response; the harness retries it.
    EmptyResponse {
        round: u32,
        attempt: u32,
        max_retries: u32,
    },
    /// The agent hit the round limit without finishing.
    RoundLimitReached { max_rounds: u32 },
}

impl HarnessEvent<'_> {
    /// Total tokens of a `TokenUsage` event, `None` for all others.
    pub fn total_tokens(&self) -> Option<u64> {
        if let HarnessEvent::TokenUsage {
            prompt_tokens,
            completion_tokens,
        } = self
        {
            Some(*prompt_tokens as u64 + *completion_tokens as u64)
        } else {
            None
        }
    }
}

/// Handler for harness events.
///
/// ```ignore
/// struct MyHandler;
///
/// impl EventHandler for MyHandler {
///     fn on_event(&self, event: &HarnessEvent<'_>) {
///         if let HarnessEvent::ToolResult { name, result, .. } = event {
///             println!("[{name}] {} bytes", result.len());
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &HarnessEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(forwarder);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        match event {
            HarnessEvent::AgentStarted { name } => {
                debug!("Agent started: {name}");
            }
            HarnessEvent::RoundStart { round, max_rounds } => {
                debug!("[round {round}/{max_rounds}]");
            }
            HarnessEvent::TextDelta(delta) => {
                let preview: String = delta.chars().take(80).collect();
                trace!("Stream text delta: {preview}");
            }
            HarnessEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "LLM text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            HarnessEvent::ToolCallsReceived { round, count } => {
                debug!("{count} tool call(s) in round {round}");
            }
            HarnessEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            HarnessEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            HarnessEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            HarnessEvent::Finished => {
                debug!("Agent finished (no more tool calls)");
            }
            HarnessEvent::EmptyResponse {
                round,
                attempt,
                max_retries,
            } => {
                warn!(
                    "Empty API response at round {round} (no content, no tool calls, ~0 tokens). \
                     Retrying ({attempt}/{max_retries})..."
                );
            }
            HarnessEvent::RoundLimitReached { max_rounds } => {
                info!("Agent hit round limit ({max_rounds})");
            }
        }
    }
}

// ── Run result ─────────────────────────────────────────────────────

/// The result of a finished [`Harness::run()`](super::harness::Harness::run).
#[derive(Debug)]
pub struct HarnessResult {
    /// Unique trace ID for this run.
    pub trace_id: String,
    /// All messages exchanged during the run (including the initial ones).
    pub messages: Vec<Message>,
    /// Text output from the model across all rounds.
    pub text_output: Vec<String>,
    pub total_prompt_tokens: u32,
    pub total_completion_tokens: u32,
    pub rounds_used: u32,
    pub estimated_cost_usd: f64,
}

impl HarnessResult {
    /// Concatenated text output from all rounds.
    pub fn text(&self) -> String {
        self.text_output.join("\n\n")
    }

    /// The text of the last round, i.e. the final answer.
    pub fn final_output(&self) -> Option<&str> {
        self.text_output.last().map(String::as_str)
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}
