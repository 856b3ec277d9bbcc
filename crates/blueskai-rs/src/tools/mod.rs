//! Tool abstractions for function-calling agents.
//!
//! Every agent capability is a [`Tool`] trait implementor: a struct with a
//! [`Tool::definition()`] and an async [`Tool::execute()`]. Tools are
//! collected into a [`ToolSet`] which handles dispatch, validation, and
//! timeouts. MCP server tools are exposed this way by
//! [`McpTool`](crate::mcp::tool::McpTool).

pub mod core;

pub use core::{
    DEFAULT_TOOL_TIMEOUT, Tool, ToolFuture, ToolSet, validate_tool_arguments,
};
