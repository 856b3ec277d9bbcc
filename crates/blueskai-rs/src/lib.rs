//! Streamed agent runtime for persona-driven tool-use agents.
//!
//! `blueskai-rs` runs a hosted chat-completions model in a tool-use loop
//! whose tools live in external [MCP](https://modelcontextprotocol.io/)
//! servers. The core abstraction is the [`Harness`](agent::harness::Harness),
//! an agentic loop that sends messages to the model, executes tool calls,
//! appends the results and repeats until the model answers with text only or
//! the turn limit is reached.
//!
//! On top of the harness sits a streamed-run layer: a
//! [`CompletionEngine`](agent::engine::CompletionEngine) turns an
//! [`Agent`](agent::definition::Agent) plus an input prompt into a live
//! [`RunStream`](agent::stream::RunStream) of
//! [`StreamEvent`](agent::stream::StreamEvent)s, and
//! [`classify`](agent::classify::classify) renders the interesting ones.
//!
//! # Getting started
//!
//! ```ignore
//! use blueskai_rs::prelude::*;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let client = OpenAiClient::new(std::env::var("OPENAI_API_KEY").unwrap())?;
//!     let bsky = McpServerStdio::connect(McpServerParams::new("bsky", "bin/bsky-rmcp"))
//!         .await
//!         .map_err(|e| e.to_string())?;
//!
//!     let agent = Agent::new("Processor", "You are Alice.", "o4-mini-2025-04-16")
//!         .with_mcp_servers(vec![bsky.clone()]);
//!
//!     let engine = HarnessEngine::new(client);
//!     let mut stream = engine.run_streamed(&agent, "Say hello.", DEFAULT_MAX_TURNS);
//!     while let Some(event) = stream.next().await {
//!         if let Some(rendered) = classify(&event?) {
//!             println!("{rendered}");
//!         }
//!     }
//!     bsky.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Harness`](agent::harness::Harness) loop, config, events, streamed runs, classifier |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, [`ToolSet`](tools::core::ToolSet) |
//! | [`mcp`] | MCP stdio client and the adapter exposing server tools as [`Tool`](tools::core::Tool)s |
//! | [`api`] | Typed API errors, SSE streaming, retry with backoff, cost tracking |

pub mod agent;
pub mod api;
pub mod mcp;
pub mod prelude;
pub mod tools;

use crate::api::error::ApiError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for agent runs.
pub(crate) const DEFAULT_MODEL: &str = "o4-mini-2025-04-16";

/// Whole-request timeout for completion calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization so reasoning models never see sampling parameters they
/// reject.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Reasoning effort for o-series models.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant turn that requested tool calls, optionally with the text
    /// the model produced alongside them.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    refusal: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// One model turn, from either [`OpenAiClient::chat`] or an assembled stream.
#[derive(Debug, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) url: String,
}

impl OpenAiClient {
    /// Create a client for the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("blueskai-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: OPENAI_URL.to_string(),
        })
    }

    /// Point the client at a different chat completions URL (proxies,
    /// compatible providers, local stubs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// The chat completions URL requests are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn post(&self, body: &impl Serialize) -> reqwest::RequestBuilder {
        self.client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, ApiError> {
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}",
            body.model,
            body.messages.len(),
            tool_count,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(ApiError::Api(err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let Some(choice) = parsed.choices.and_then(|c| c.into_iter().next()) else {
            debug!("LLM output: empty (no choices)");
            return Ok(ChatCompletion {
                usage: parsed.usage,
                ..Default::default()
            });
        };

        // A refusal takes the place of content; surface it as text.
        let content = choice.message.content.or(choice.message.refusal);
        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        debug!(
            "LLM output: {} chars text, {} tool call(s)",
            content.as_ref().map_or(0, |s| s.len()),
            tool_calls.len()
        );

        Ok(ChatCompletion {
            content,
            tool_calls,
            usage: parsed.usage,
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let tool = Message::tool_result("call-1", "result");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));

        let calls = Message::assistant_tool_calls(None, vec![]);
        assert_eq!(calls.role, MessageRole::Assistant);
        assert!(calls.content.is_none());
    }

    #[test]
    fn chat_request_skips_unset_sampling_fields() {
        let req = ChatRequest {
            model: "o4-mini-2025-04-16".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "o4-mini-2025-04-16");
        assert!(json.get("max_completion_tokens").is_none());
        assert!(json.get("tools").is_none());
        assert!(json.get("reasoning_effort").is_none());
    }

    #[test]
    fn reasoning_effort_serializes_lowercase() {
        let req = ChatRequest {
            model: "o4-mini-2025-04-16".into(),
            reasoning_effort: Some(ReasoningEffort::High),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["reasoning_effort"], "high");
    }

    #[test]
    fn assistant_tool_call_message_round_trips_wire_shape() {
        let msg = Message::assistant_tool_calls(
            Some("checking".into()),
            vec![ToolCall {
                id: "call_1".into(),
                call_type: CallType::Function,
                function: FunctionCallData {
                    name: "get_timeline".into(),
                    arguments: "{}".into(),
                },
            }],
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "get_timeline");
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn client_base_url_override() {
        let client = OpenAiClient::new("sk-test")
            .unwrap()
            .with_base_url("http://127.0.0.1:9/v1/chat/completions");
        assert_eq!(client.url(), "http://127.0.0.1:9/v1/chat/completions");
    }
}
