//! Convenience re-exports for common `blueskai-rs` types.
//!
//! ```ignore
//! use blueskai_rs::prelude::*;
//! ```
//!
//! Covers the client and message types, the harness and its handlers, agent
//! definitions with the engine seam, tools and MCP servers. Streaming chunk
//! parsing and retry internals stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatRequest, Message, OpenAiClient, ReasoningEffort, ToolDef};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, CompletionEngine, CompositeEventHandler, DEFAULT_MAX_TURNS, EventHandler,
    FnEventHandler, Harness, HarnessConfig, HarnessEngine, HarnessEvent, HarnessResult,
    LogSink, LoggingHandler, NoopHandler, RenderSink, RenderedEvent, RunStream, StreamEvent,
    classify,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{Tool, ToolFuture, ToolSet};

// ── MCP ─────────────────────────────────────────────────────────────
pub use crate::mcp::{McpServerParams, McpServerStdio, mcp_tool_set};
