//! Agent harness: the tool-use loop on top of the chat completions API.
//!
//! The [`Harness`] sends messages and tool definitions to the model,
//! executes any returned tool calls via the [`ToolSet`], appends the
//! results, and repeats until the model produces a text-only response or
//! the round limit is reached. Callers observe the loop via
//! [`EventHandler`] events.

use super::config::HarnessConfig;
use super::events::{EventHandler, HarnessEvent, HarnessResult, NoopHandler};
use super::execution::{execute_tool_calls, send_round_request};
use crate::api::tracing::{CostTracker, generate_span_id, generate_trace_id, pricing_for_model};
use crate::tools::core::ToolSet;
use crate::{Message, OpenAiClient};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retries granted to a round whose response had no text, no tool calls and
/// no completion tokens.
const MAX_EMPTY_RESPONSE_RETRIES: u32 = 3;

// ── Harness ────────────────────────────────────────────────────────

/// The agentic tool-use loop.
///
/// ```ignore
/// let client = OpenAiClient::new(api_key)?;
/// let tools = ToolSet::new().with(MyTool);
/// let config = HarnessConfig::new("o4-mini-2025-04-16");
/// let messages = vec![Message::system("..."), Message::user("...")];
///
/// let handler = LoggingHandler;
/// let result = Harness::new(&client, &tools, config)
///     .with_event_handler(&handler)
///     .run(messages)
///     .await?;
///
/// println!("{}", result.text());
/// ```
///
/// `Harness<'a>` borrows the client, tools, and event handler; bind them to
/// `let`s before building the harness so they outlive `.run()`.
pub struct Harness<'a> {
    client: &'a OpenAiClient,
    tools: &'a ToolSet,
    config: HarnessConfig,
    event_handler: &'a dyn EventHandler,
}

impl<'a> Harness<'a> {
    pub fn new(client: &'a OpenAiClient, tools: &'a ToolSet, config: HarnessConfig) -> Self {
        Self {
            client,
            tools,
            config,
            event_handler: &NoopHandler,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Run the loop over the initial messages (system + user).
    ///
    /// Fails on the first API error that survives retries, and with
    /// `"max turns (N) exceeded"` when the model is still calling tools after
    /// `max_rounds` rounds.
    pub async fn run(self, mut messages: Vec<Message>) -> Result<HarnessResult, String> {
        let pricing = pricing_for_model(&self.config.model);
        let mut acc = RunAccumulator {
            trace_id: generate_trace_id(),
            text_output: Vec::new(),
            total_prompt_tokens: 0,
            total_completion_tokens: 0,
            cost_tracker: CostTracker::new(),
            rounds_used: 0,
            finished: false,
        };
        let mut empty_response_retries: u32 = 0;

        info!(
            "Harness run started: trace_id={}, model={}",
            acc.trace_id, self.config.model
        );
        self.event_handler.on_event(&HarnessEvent::AgentStarted {
            name: &self.config.agent_name,
        });

        let tool_defs = self.tools.definitions();
        let tools_option = (!tool_defs.is_empty()).then_some(tool_defs);

        for round in 0..self.config.max_rounds {
            acc.rounds_used = round + 1;
            debug!("span {}", generate_span_id(&acc.trace_id, round + 1));
            self.event_handler.on_event(&HarnessEvent::RoundStart {
                round: round + 1,
                max_rounds: self.config.max_rounds,
            });

            let completion = send_round_request(
                &self.config,
                self.client,
                &messages,
                &tools_option,
                self.event_handler,
            )
            .await?;

            if let Some(ref u) = completion.usage {
                let pt = u.prompt_tokens.unwrap_or(0);
                let ct = u.completion_tokens.unwrap_or(0);
                acc.total_prompt_tokens += pt;
                acc.total_completion_tokens += ct;
                acc.cost_tracker.record(pt, ct, &pricing);
                self.event_handler.on_event(&HarnessEvent::TokenUsage {
                    prompt_tokens: pt,
                    completion_tokens: ct,
                });
            }

            let text = completion.content.filter(|t| !t.is_empty());
            if let Some(ref text) = text {
                self.event_handler.on_event(&HarnessEvent::Text(text));
                acc.text_output.push(text.clone());
            }

            if completion.tool_calls.is_empty() {
                let completion_tokens = completion
                    .usage
                    .as_ref()
                    .and_then(|u| u.completion_tokens)
                    .unwrap_or(0);

                // HTTP 200 with nothing in it: retry instead of finishing.
                if text.is_none() && completion_tokens == 0 {
                    empty_response_retries += 1;
                    if empty_response_retries <= MAX_EMPTY_RESPONSE_RETRIES {
                        self.event_handler.on_event(&HarnessEvent::EmptyResponse {
                            round: round + 1,
                            attempt: empty_response_retries,
                            max_retries: MAX_EMPTY_RESPONSE_RETRIES,
                        });
                        tokio::time::sleep(Duration::from_millis(
                            500 * u64::from(empty_response_retries),
                        ))
                        .await;
                        continue;
                    }
                    warn!(
                        "Empty API response persisted after {MAX_EMPTY_RESPONSE_RETRIES} retries. \
                         Treating as agent completion."
                    );
                }

                if let Some(text) = text {
                    messages.push(Message::assistant_text(text));
                }
                acc.finished = true;
                self.event_handler.on_event(&HarnessEvent::Finished);
                break;
            }

            empty_response_retries = 0;

            self.event_handler
                .on_event(&HarnessEvent::ToolCallsReceived {
                    round: round + 1,
                    count: completion.tool_calls.len(),
                });
            messages.push(Message::assistant_tool_calls(
                text,
                completion.tool_calls.clone(),
            ));
            execute_tool_calls(
                &self.config,
                self.tools,
                self.event_handler,
                &completion.tool_calls,
                &mut messages,
            )
            .await;
        }

        finalize_run(&self.config, acc, messages, self.event_handler)
    }
}

/// Values accumulated across rounds during a harness run.
struct RunAccumulator {
    trace_id: String,
    text_output: Vec<String>,
    total_prompt_tokens: u32,
    total_completion_tokens: u32,
    cost_tracker: CostTracker,
    rounds_used: u32,
    finished: bool,
}

/// Post-loop finalization: emit the limit event or build the result.
fn finalize_run(
    config: &HarnessConfig,
    acc: RunAccumulator,
    messages: Vec<Message>,
    event_handler: &dyn EventHandler,
) -> Result<HarnessResult, String> {
    info!(
        "Harness run completed: trace_id={}, rounds={}, {}",
        acc.trace_id,
        acc.rounds_used,
        acc.cost_tracker.summary()
    );

    if !acc.finished {
        event_handler.on_event(&HarnessEvent::RoundLimitReached {
            max_rounds: config.max_rounds,
        });
        return Err(format!("max turns ({}) exceeded", config.max_rounds));
    }

    Ok(HarnessResult {
        trace_id: acc.trace_id,
        messages,
        text_output: acc.text_output,
        total_prompt_tokens: acc.total_prompt_tokens,
        total_completion_tokens: acc.total_completion_tokens,
        rounds_used: acc.rounds_used,
        estimated_cost_usd: acc.cost_tracker.estimated_cost_usd,
    })
}
