//! Launch parameters and lifecycle of the tool servers a profile enables.

use crate::settings::{Profile, Settings, ToolServerKind};
use blueskai_rs::mcp::{McpError, McpServerParams, McpServerStdio};
use std::time::Duration;
use tracing::info;

/// Per-request timeout for the remote expertise server.
pub const EXPERTISE_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Parameters for every server the profile enables, in startup order.
pub fn server_params(settings: &Settings, profile: &Profile) -> Vec<McpServerParams> {
    ToolServerKind::ALL
        .into_iter()
        .filter(|kind| profile.enables(*kind))
        .map(|kind| match kind {
            ToolServerKind::Bsky => McpServerParams::new(
                kind.as_str(),
                settings.bsky_rmcp_bin.display().to_string(),
            )
            .with_env("BLUESKY_IDENTIFIER", &profile.bsky_identifier)
            .with_env("BLUESKY_APP_PASSWORD", &profile.bsky_app_password)
            .with_env("TZ", &settings.timezone)
            .with_env("RUST_LOG", "info"),
            ToolServerKind::Expertise => McpServerParams::new(kind.as_str(), "npx")
                .with_args(["-y", "mcp-remote", settings.expertise_mcp_url.as_str()])
                .with_request_timeout(EXPERTISE_REQUEST_TIMEOUT),
        })
        .collect()
}

/// Connect to each server in order. If one fails, the ones already running
/// are closed before the error is returned.
pub async fn connect_tool_servers(
    params: Vec<McpServerParams>,
) -> Result<Vec<McpServerStdio>, McpError> {
    let mut servers = Vec::with_capacity(params.len());
    for p in params {
        match McpServerStdio::connect(p).await {
            Ok(server) => {
                info!(server = server.name(), "tool server connected");
                servers.push(server);
            }
            Err(err) => {
                close_tool_servers(&servers).await;
                return Err(err);
            }
        }
    }
    Ok(servers)
}

pub async fn close_tool_servers(servers: &[McpServerStdio]) {
    for server in servers {
        server.close().await;
    }
}
