use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, ToolResult, MAX_MESSAGE_BYTES, PROTOCOL_VERSION,
};
use super::{parse_output, with_deadline, Backend, BackendError, BackendPaths};

const SETUP_TOOL: &str = "setup";
const ASK_TOOL: &str = "ask";

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// One MCP session with the backend server.
///
/// Exchanges are strictly request/response, so concurrent questions take
/// turns on the session lock.
pub struct McpBackend {
    session: Mutex<Session>,
    timeout: Option<Duration>,
}

struct Session {
    reader: Reader,
    writer: Writer,
    next_id: u64,
    line: Vec<u8>,
    // Killed on drop.
    _child: Option<Child>,
}

impl McpBackend {
    /// Spawn `sh -c <command>` as an MCP server on stdio and initialize it.
    pub async fn spawn(
        command: &str,
        paths: &BackendPaths,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        if command.trim().is_empty() {
            return Err(BackendError::MissingCommand);
        }

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(BackendError::SpawnFailure)?;

        let stdin = child.stdin.take().ok_or(BackendError::Closed)?;
        let stdout = child.stdout.take().ok_or(BackendError::Closed)?;
        tracing::debug!(command, pid = ?child.id(), "spawned MCP backend");

        Self::start(
            Box::new(BufReader::new(stdout)),
            Box::new(stdin),
            Some(child),
            paths,
            timeout,
        )
        .await
    }

    /// Initialize a session over an already-connected transport.
    pub async fn connect<R, W>(
        reader: R,
        writer: W,
        paths: &BackendPaths,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::start(Box::new(reader), Box::new(writer), None, paths, timeout).await
    }

    async fn start(
        reader: Reader,
        writer: Writer,
        child: Option<Child>,
        paths: &BackendPaths,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let backend = Self {
            session: Mutex::new(Session {
                reader,
                writer,
                next_id: 1,
                line: Vec::new(),
                _child: child,
            }),
            timeout,
        };

        with_deadline(timeout, backend.initialize(paths)).await?;
        Ok(backend)
    }

    async fn initialize(&self, paths: &BackendPaths) -> Result<(), BackendError> {
        let mut session = self.session.lock().await;

        let init = session
            .call(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;
        let server = init.get("serverInfo").cloned().unwrap_or_default();
        tracing::debug!(%server, "MCP handshake complete");

        session.notify("notifications/initialized").await?;

        let ready = session
            .call_tool(
                SETUP_TOOL,
                json!({
                    "config_path": paths.config_path.to_string_lossy(),
                    "questions_path": paths.questions_path.to_string_lossy(),
                    "schema_path": paths.schema_path.to_string_lossy()
                }),
            )
            .await?;
        tracing::debug!(reply = %ready, "backend setup complete");

        Ok(())
    }
}

impl Session {
    async fn send(&mut self, request: &JsonRpcRequest<'_>) -> Result<(), BackendError> {
        let mut out =
            serde_json::to_vec(request).map_err(|e| BackendError::Protocol(e.to_string()))?;
        out.push(b'\n');
        self.writer.write_all(&out).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn notify(&mut self, method: &str) -> Result<(), BackendError> {
        self.send(&JsonRpcRequest::notification(method)).await
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value, BackendError> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&JsonRpcRequest::call(id, method, params)).await?;

        loop {
            let response = self.read_message().await?;
            if !response.answers(id) {
                tracing::trace!(
                    method = ?response.method,
                    id = ?response.id,
                    "skipping unrelated backend message"
                );
                continue;
            }

            if let Some(error) = response.error {
                return Err(BackendError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    async fn call_tool(&mut self, tool: &str, arguments: Value) -> Result<Value, BackendError> {
        let result = self
            .call("tools/call", json!({ "name": tool, "arguments": arguments }))
            .await?;
        let result: ToolResult = serde_json::from_value(result)
            .map_err(|e| BackendError::Protocol(format!("invalid result for tool `{tool}`: {e}")))?;

        let text = result.text();
        if result.is_error {
            return Err(BackendError::Tool {
                tool: tool.to_string(),
                message: text,
            });
        }
        Ok(parse_output(text.trim()))
    }

    async fn read_message(&mut self) -> Result<JsonRpcResponse, BackendError> {
        loop {
            self.line.clear();
            let n = (&mut self.reader)
                .take(MAX_MESSAGE_BYTES as u64 + 1)
                .read_until(b'\n', &mut self.line)
                .await?;
            if n == 0 {
                return Err(BackendError::Closed);
            }
            if n > MAX_MESSAGE_BYTES {
                self.discard_line().await?;
                return Err(BackendError::Protocol(format!(
                    "message exceeds {MAX_MESSAGE_BYTES} bytes"
                )));
            }

            let text = std::str::from_utf8(&self.line)
                .map_err(|_| BackendError::Protocol("message is not valid UTF-8".to_string()))?
                .trim();
            if text.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(text) {
                Ok(response) => return Ok(response),
                Err(e) => tracing::warn!("ignoring non JSON-RPC output from backend: {e}"),
            }
        }
    }

    /// Skip the remainder of an oversized line without buffering it.
    async fn discard_line(&mut self) -> Result<(), BackendError> {
        while self.line.last() != Some(&b'\n') {
            self.line.clear();
            let n = (&mut self.reader)
                .take(MAX_MESSAGE_BYTES as u64)
                .read_until(b'\n', &mut self.line)
                .await?;
            if n == 0 {
                break;
            }
        }
        self.line.clear();
        Ok(())
    }
}

#[async_trait]
impl Backend for McpBackend {
    /// The deadline starts once this question holds the session, so time
    /// spent queued behind other questions does not count against it.
    async fn ask(&self, question: &str) -> Result<Value, BackendError> {
        let mut session = self.session.lock().await;
        with_deadline(
            self.timeout,
            session.call_tool(ASK_TOOL, json!({ "question": question })),
        )
        .await
    }

    fn mode(&self) -> &'static str {
        "mcp"
    }
}
