//! Model Context Protocol client over stdio.
//!
//! - [`stdio`]: [`McpServerStdio`] spawns a server process and speaks
//!   JSON-RPC to it (`initialize`, `tools/list`, `tools/call`).
//! - [`tool`]: [`McpTool`] adapts a server tool to the [`Tool`](crate::tools::Tool)
//!   trait; [`mcp_tool_set`] builds a run's [`ToolSet`](crate::tools::ToolSet).
//! - [`protocol`]: wire types.
//! - [`error`]: [`McpError`].

pub mod error;
pub mod protocol;
pub mod stdio;
pub mod tool;

pub use error::McpError;
pub use protocol::{CallToolResult, ContentBlock, McpToolInfo};
pub use stdio::{DEFAULT_REQUEST_TIMEOUT, McpServerParams, McpServerStdio};
pub use tool::{McpTool, mcp_tool_set};
