#![cfg(unix)]

mod common;

use blueskai_rs::mcp::{McpError, McpServerStdio, mcp_tool_set};
use common::stub_mcp_params;
use serde_json::json;

#[tokio::test]
async fn connect_lists_tools_and_calls_them() {
    let dir = tempfile::tempdir().unwrap();
    let server = McpServerStdio::connect(stub_mcp_params(dir.path(), "stub"))
        .await
        .unwrap();

    let names: Vec<String> = server.tools().await.into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["echo", "fail"]);
    assert_eq!(server.instructions().await.as_deref(), Some("Stub server"));

    let result = server
        .call_tool("echo", json!({"text": "hello"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.text(), "echo: hello");

    server.close().await;
}

#[tokio::test]
async fn tool_set_reports_errors_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let server = McpServerStdio::connect(stub_mcp_params(dir.path(), "stub"))
        .await
        .unwrap();
    let tools = mcp_tool_set(std::slice::from_ref(&server)).await.unwrap();

    assert_eq!(tools.names(), vec!["echo", "fail"]);
    let fail_def = tools
        .definitions()
        .into_iter()
        .find(|d| d.function.name == "fail")
        .unwrap();
    assert_eq!(fail_def.function.parameters["properties"], json!({}));

    assert_eq!(tools.execute("echo", r#"{"text": "hi"}"#).await, "echo: hi");
    assert_eq!(tools.execute("fail", "{}").await, "Error: boom");
    // Schema validation rejects the call before it reaches the server.
    assert!(tools.execute("echo", "{}").await.starts_with("Error"));

    server.close().await;
    let after_close = tools.execute("echo", r#"{"text": "hi"}"#).await;
    assert!(after_close.starts_with("Error: "), "{after_close}");
}

#[tokio::test]
async fn large_tool_output_is_not_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let server = McpServerStdio::connect(stub_mcp_params(dir.path(), "stub"))
        .await
        .unwrap();
    let tools = mcp_tool_set(std::slice::from_ref(&server)).await.unwrap();

    let text = "x".repeat(40_000);
    let output = tools
        .execute("echo", &json!({ "text": text }).to_string())
        .await;
    assert_eq!(output.len(), 40_006);
    assert_eq!(output, format!("echo: {text}"));

    server.close().await;
}

#[tokio::test]
async fn server_ping_during_a_request_is_answered() {
    let dir = tempfile::tempdir().unwrap();
    // The stub withholds its tool list until the client answers its ping.
    let server = McpServerStdio::connect(stub_mcp_params(dir.path(), "stub"))
        .await
        .unwrap();
    assert_eq!(server.tools().await.len(), 2);
    server.close().await;
}

#[tokio::test]
async fn duplicate_tool_names_across_servers_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let first = McpServerStdio::connect(stub_mcp_params(dir.path(), "first"))
        .await
        .unwrap();
    let second = McpServerStdio::connect(stub_mcp_params(dir.path(), "second"))
        .await
        .unwrap();

    let err = mcp_tool_set(&[first.clone(), second.clone()])
        .await
        .unwrap_err();
    match err {
        McpError::DuplicateTool {
            tool,
            first: a,
            second: b,
        } => {
            assert_eq!(tool, "echo");
            assert_eq!((a.as_str(), b.as_str()), ("first", "second"));
        }
        other => panic!("unexpected error: {other}"),
    }

    first.close().await;
    second.close().await;
}

#[tokio::test]
async fn server_that_exits_fails_the_handshake() {
    let params = blueskai_rs::mcp::McpServerParams::new("gone", "sh")
        .with_args(["-c", "exit 0"])
        .with_request_timeout(std::time::Duration::from_secs(5));
    let err = McpServerStdio::connect(params).await.unwrap_err();
    assert!(
        matches!(
            err,
            McpError::Terminated { .. } | McpError::Transport { .. } | McpError::Cancelled { .. }
        ),
        "{err}"
    );
}
