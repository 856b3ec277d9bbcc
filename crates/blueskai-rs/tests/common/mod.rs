//! Loopback stand-in for the chat completions endpoint.

#![allow(dead_code)]

use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One scripted response.
pub enum Reply {
    Json(Value),
    /// Each value becomes one `data:` event, followed by `data: [DONE]`.
    Sse(Vec<Value>),
    Status(u16, &'static str),
    /// Like `Sse`, but the body goes out in two writes, the first ending
    /// after the first byte of `split_before`'s first occurrence.
    SplitSse {
        chunks: Vec<Value>,
        split_before: &'static str,
    },
}

/// Serves the scripted replies in order, one connection each, and records
/// every request body.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!(
            "http://{}/v1/chat/completions",
            listener.local_addr().unwrap()
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let task = tokio::spawn(async move {
            for reply in replies {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let body = read_body(&mut socket).await;
                recorded.lock().unwrap().push(body);
                write_reply(&mut socket, reply).await;
            }
        });

        Self {
            url,
            requests,
            task,
        }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_body(socket: &mut TcpStream) -> Value {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return Value::Null;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = head_end + 4;
        while buf.len() < body_start + length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        return serde_json::from_slice(&buf[body_start..body_start + length]).unwrap();
    }
}

async fn write_reply(socket: &mut TcpStream, reply: Reply) {
    let (status, content_type, payload) = match reply {
        Reply::Json(value) => (200, "application/json", value.to_string()),
        Reply::Sse(chunks) => (200, "text/event-stream", sse_payload(chunks)),
        Reply::Status(code, body) => (code, "text/plain", body.to_string()),
        Reply::SplitSse {
            chunks,
            split_before,
        } => {
            let payload = sse_payload(chunks);
            let cut = payload.find(split_before).unwrap() + 1;
            let head = format!(
                "HTTP/1.1 200 Stub\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                payload.len()
            );
            let bytes = payload.as_bytes();
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&bytes[..cut]).await;
            let _ = socket.flush().await;
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            let _ = socket.write_all(&bytes[cut..]).await;
            let _ = socket.shutdown().await;
            return;
        }
    };
    let head = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(payload.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn sse_payload(chunks: Vec<Value>) -> String {
    let mut payload = String::new();
    for chunk in chunks {
        payload.push_str(&format!("data: {chunk}\n\n"));
    }
    payload.push_str("data: [DONE]\n\n");
    payload
}

/// A non-streaming completion carrying one tool call.
pub fn tool_call_reply(id: &str, name: &str, arguments: &str) -> Reply {
    Reply::Json(serde_json::json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
}

/// A non-streaming completion carrying only text.
pub fn text_reply(text: &str) -> Reply {
    Reply::Json(serde_json::json!({
        "choices": [{
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 3, "total_tokens": 23}
    }))
}

/// Shell script speaking just enough MCP over stdio: `initialize`,
/// `tools/list` with an `echo` and a `fail` tool, and `tools/call`. It pings
/// the client before answering `tools/list`.
pub const MCP_SERVER_SCRIPT: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":\"$id\",\"result\":{\"protocolVersion\":\"2025-06-18\",\"serverInfo\":{\"name\":\"stub\",\"version\":\"0.1.0\"},\"capabilities\":{\"tools\":{}},\"instructions\":\"Stub server\"}}"
      ;;
    *'"method":"tools/list"'*)
      # Ping the client mid-request; the catalogue is only sent once it answers.
      printf '%s\n' '{"jsonrpc":"2.0","id":"srv-ping","method":"ping"}'
      IFS= read -r pong
      case "$pong" in
        *'"id":"srv-ping"'*'"result"'*)
          printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":\"$id\",\"result\":{\"tools\":[{\"name\":\"echo\",\"description\":\"Echo text\",\"inputSchema\":{\"type\":\"object\",\"properties\":{\"text\":{\"type\":\"string\"}},\"required\":[\"text\"]}},{\"name\":\"fail\",\"inputSchema\":{\"type\":\"object\"}}]}}"
          ;;
        *)
          printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":\"$id\",\"error\":{\"code\":-32000,\"message\":\"ping was not answered\"}}"
          ;;
      esac
      ;;
    *'"method":"tools/call"'*'"name":"echo"'*)
      text=$(printf '%s\n' "$line" | sed -n 's/.*"text":"\([^"]*\)".*/\1/p')
      printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":\"$id\",\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"echo: $text\"}]}}"
      ;;
    *'"method":"tools/call"'*)
      printf '%s\n' "{\"jsonrpc\":\"2.0\",\"id\":\"$id\",\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"boom\"}],\"isError\":true}}"
      ;;
  esac
done
"#;

/// Write the stub MCP server into `dir` and return params that run it.
pub fn stub_mcp_params(dir: &std::path::Path, name: &str) -> blueskai_rs::mcp::McpServerParams {
    let script = dir.join(format!("{name}.sh"));
    std::fs::write(&script, MCP_SERVER_SCRIPT).unwrap();
    blueskai_rs::mcp::McpServerParams::new(name, "sh").with_args([script.display().to_string()])
}
