//! JSON-RPC client for an MCP server running as a child process.
//!
//! Messages are newline-delimited JSON on the child's stdin/stdout. A
//! background reader task routes responses to waiting requests by id, answers
//! server `ping`s and refreshes the tool catalogue when the server announces
//! a change. Answers to server requests are queued for a separate writer
//! task, so the reader never waits on stdin while a large request is being
//! written. Both tasks hold only a weak reference to the connection, so
//! dropping the last [`McpServerStdio`] handle kills the child.

use super::error::McpError;
use super::protocol::{
    CallToolResult, InitializeResult, ListToolsResult, McpToolInfo, PROTOCOL_VERSION,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How to launch an MCP server.
#[derive(Debug, Clone)]
pub struct McpServerParams {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment for the child, on top of the inherited one.
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl McpServerParams {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// A connected MCP server. Cheap to clone; all clones share one process.
#[derive(Clone)]
pub struct McpServerStdio {
    inner: Arc<Inner>,
}

type Responder = oneshot::Sender<Result<Value, McpError>>;

struct Inner {
    params: McpServerParams,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    /// Outgoing answers to server-initiated requests.
    replies: mpsc::UnboundedSender<Value>,
    pending: AsyncMutex<HashMap<String, Responder>>,
    id_counter: AtomicU64,
    tools: AsyncMutex<Vec<McpToolInfo>>,
    instructions: AsyncMutex<Option<String>>,
}

impl fmt::Debug for McpServerStdio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpServerStdio")
            .field("name", &self.inner.params.name)
            .field("command", &self.inner.params.command)
            .finish()
    }
}

impl McpServerStdio {
    /// Spawn the server, run the `initialize` handshake and cache its tools.
    pub async fn connect(params: McpServerParams) -> Result<Self, McpError> {
        let mut command = Command::new(&params.command);
        command
            .args(&params.args)
            .envs(&params.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &params.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| McpError::Spawn {
            server: params.name.clone(),
            source,
        })?;

        let (inner, replies) = Inner::new(params);
        let inner = Arc::new(inner);

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| inner.transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| inner.transport_error("failed to capture server stdout"))?;

        *inner.writer.lock().await = Some(BufWriter::new(stdin));
        *inner.child.lock().await = Some(child);

        tokio::spawn(reply_loop(Arc::downgrade(&inner), replies));
        tokio::spawn(reader_loop(Arc::downgrade(&inner), stdout));

        if let Err(err) = inner.initialize().await {
            inner.reset().await;
            return Err(err);
        }

        Ok(Self { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.params.name
    }

    pub fn params(&self) -> &McpServerParams {
        &self.inner.params
    }

    /// The tool catalogue as of the last `tools/list`.
    pub async fn tools(&self) -> Vec<McpToolInfo> {
        self.inner.tools.lock().await.clone()
    }

    /// Instructions the server returned from `initialize`, if any.
    pub async fn instructions(&self) -> Option<String> {
        self.inner.instructions.lock().await.clone()
    }

    /// Invoke `tools/call`. A result with `isError` set is still `Ok`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let result = self
            .inner
            .send_request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        serde_json::from_value(result).map_err(|source| McpError::InvalidJson {
            server: self.inner.params.name.clone(),
            source,
        })
    }

    /// Kill the server and fail any in-flight requests.
    pub async fn close(&self) {
        info!(server = %self.inner.params.name, "closing MCP server");
        self.inner.reset().await;
    }
}

impl Inner {
    fn new(params: McpServerParams) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (replies, rx) = mpsc::unbounded_channel();
        let inner = Self {
            params,
            child: AsyncMutex::new(None),
            writer: AsyncMutex::new(None),
            replies,
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            tools: AsyncMutex::new(Vec::new()),
            instructions: AsyncMutex::new(None),
        };
        (inner, rx)
    }

    async fn initialize(&self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        let raw = self.send_request("initialize", params).await?;
        let init: InitializeResult =
            serde_json::from_value(raw).map_err(|source| McpError::InvalidJson {
                server: self.params.name.clone(),
                source,
            })?;
        debug!(
            server = %self.params.name,
            remote = %init.server_info.name,
            protocol = %init.protocol_version,
            "MCP server initialized"
        );
        *self.instructions.lock().await = init.instructions;

        self.send_notification("notifications/initialized", json!({}))
            .await?;
        self.refresh_tools().await
    }

    async fn refresh_tools(&self) -> Result<(), McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let raw = self.send_request("tools/list", params).await?;
            let page: ListToolsResult =
                serde_json::from_value(raw).map_err(|source| McpError::InvalidJson {
                    server: self.params.name.clone(),
                    source,
                })?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        info!(
            server = %self.params.name,
            count = tools.len(),
            "MCP tool catalogue loaded"
        );
        *self.tools.lock().await = tools;
        Ok(())
    }

    async fn process_inbound_message(self: &Arc<Self>, value: Value) -> Result<(), McpError> {
        let has_method = value.get("method").is_some();
        match value.get("id").cloned() {
            Some(id) if has_method => self.handle_server_request(id, &value),
            Some(id) => {
                self.handle_response(&id, value).await;
                Ok(())
            }
            None if has_method => {
                self.handle_notification(&value);
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn handle_response(&self, id: &Value, value: Value) {
        let key = match id {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return,
        };

        let Some(sender) = self.pending.lock().await.remove(&key) else {
            debug!(
                server = %self.params.name,
                response_id = key,
                "received response for unknown request"
            );
            return;
        };

        let outcome = match value.get("error") {
            Some(err) => Err(McpError::Rpc {
                server: self.params.name.clone(),
                code: err.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = sender.send(outcome);
    }

    /// Answer a server-initiated request. Only queues the answer; the reply
    /// task does the write.
    fn handle_server_request(&self, id: Value, value: &Value) -> Result<(), McpError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let reply = if method == "ping" {
            json!({ "jsonrpc": "2.0", "id": id, "result": {} })
        } else {
            warn!(
                server = %self.params.name,
                method,
                "server sent unsupported request"
            );
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": -32601,
                    "message": format!("client does not implement method '{method}'"),
                }
            })
        };
        self.replies
            .send(reply)
            .map_err(|_| self.transport_error("reply writer has stopped"))
    }

    fn handle_notification(self: &Arc<Self>, value: &Value) {
        let Some(method) = value.get("method").and_then(Value::as_str) else {
            return;
        };
        debug!(server = %self.params.name, method, "received notification from server");
        if method == "notifications/tools/list_changed" {
            // The reader task must keep reading for the refresh to complete.
            let this = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = this.refresh_tools().await {
                    warn!(server = %this.params.name, %err, "failed to refresh tool catalogue");
                }
            });
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = format!("req-{}", self.id_counter.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.params.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(McpError::Cancelled {
                server: self.params.name.clone(),
            }),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout {
                    server: self.params.name.clone(),
                    method: method.to_string(),
                    secs: self.params.request_timeout.as_secs(),
                })
            }
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), McpError> {
        self.write_message(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        }))
        .await
    }

    async fn write_message(&self, message: &Value) -> Result<(), McpError> {
        let mut encoded =
            serde_json::to_string(message).map_err(|source| McpError::InvalidJson {
                server: self.params.name.clone(),
                source,
            })?;
        encoded.push('\n');

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| self.transport_error("server is not running"))?;
        stream
            .write_all(encoded.as_bytes())
            .await
            .map_err(|e| self.transport_error(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| self.transport_error(e.to_string()))
    }

    async fn reset(&self) {
        self.writer.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                debug!(
                    server = %self.params.name,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
            let _ = child.wait().await;
        }

        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(McpError::Terminated {
                server: self.params.name.clone(),
            }));
        }
    }

    fn transport_error(&self, message: impl Into<String>) -> McpError {
        McpError::Transport {
            server: self.params.name.clone(),
            message: message.into(),
        }
    }
}

async fn reply_loop(inner: Weak<Inner>, mut replies: mpsc::UnboundedReceiver<Value>) {
    while let Some(reply) = replies.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if let Err(err) = inner.write_message(&reply).await {
            warn!(server = %inner.params.name, %err, "failed to answer MCP server request");
        }
    }
}

async fn reader_loop(inner: Weak<Inner>, stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(raw)) = lines.next_line().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('\u{1b}') {
            debug!(
                server = %inner.params.name,
                line = trimmed,
                "skipping non-JSON ANSI log line from MCP server"
            );
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                if let Err(err) = inner.process_inbound_message(value).await {
                    warn!(server = %inner.params.name, %err, "failed to process message from MCP server");
                }
            }
            Err(source) => {
                warn!(
                    server = %inner.params.name,
                    line = trimmed,
                    %source,
                    "received invalid JSON from MCP server"
                );
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        debug!(server = %inner.params.name, "MCP server stdout closed");
        inner.reset().await;
    }
}
