//! Exposes MCP server tools to the harness as ordinary [`Tool`]s.

use super::error::McpError;
use super::protocol::McpToolInfo;
use super::stdio::McpServerStdio;
use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, ToolSet};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// One tool of one connected MCP server.
#[derive(Debug, Clone)]
pub struct McpTool {
    server: McpServerStdio,
    info: McpToolInfo,
}

impl McpTool {
    pub fn new(server: McpServerStdio, info: McpToolInfo) -> Self {
        Self { server, info }
    }

    pub fn server_name(&self) -> &str {
        self.server.name()
    }
}

impl Tool for McpTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            self.info.name.clone(),
            self.info.description.clone().unwrap_or_default(),
            normalize_schema(&self.info.input_schema),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: Value = if arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                match serde_json::from_str(&arguments) {
                    Ok(v) => v,
                    Err(e) => return format!("Error: invalid tool arguments: {e}"),
                }
            };
            match self.server.call_tool(&self.info.name, args).await {
                Ok(result) if result.is_error => format!("Error: {}", result.text()),
                Ok(result) => result.text(),
                Err(e) => format!("Error: {e}"),
            }
        })
    }

    fn name(&self) -> String {
        self.info.name.clone()
    }
}

/// Function-calling needs an object schema with `properties`; some servers
/// omit it for argument-less tools.
fn normalize_schema(schema: &Value) -> Value {
    let mut schema = match schema {
        Value::Object(map) => Value::Object(map.clone()),
        _ => serde_json::json!({ "type": "object" }),
    };
    if let Value::Object(map) = &mut schema {
        map.entry("type").or_insert_with(|| Value::from("object"));
        map.entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    schema
}

/// Build the tool set for one run from the agent's connected servers.
///
/// Arguments are validated against each tool's schema before the call, and
/// every call is bounded by the slowest server's request timeout. Two servers
/// offering the same tool name is a configuration error.
pub async fn mcp_tool_set(servers: &[McpServerStdio]) -> Result<ToolSet, McpError> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut set = ToolSet::new().with_arg_validation(true);
    let mut timeout = Duration::ZERO;

    for server in servers {
        timeout = timeout.max(server.params().request_timeout);
        for info in server.tools().await {
            if let Some(first) = owners.insert(info.name.clone(), server.name().to_string()) {
                return Err(McpError::DuplicateTool {
                    tool: info.name,
                    first,
                    second: server.name().to_string(),
                });
            }
            debug!("Registering MCP tool {} from {}", info.name, server.name());
            set.register(McpTool::new(server.clone(), info));
        }
    }

    // The client already times out each request; this catches a stuck write.
    let timeout = (!servers.is_empty()).then(|| timeout + Duration::from_secs(1));
    Ok(set.with_default_timeout(timeout))
}
