//! # Query Server
//!
//! Newline-delimited JSON-RPC over a reader/writer pair, one request per
//! line, one response line per request (none for notifications).
//!
//! ## Session states
//!
//! - `Uninitialized`: only `initialize` succeeds; anything else is rejected
//!   with `-32002` and the state does not change
//! - `Initialized`: `tools/list` and `tools/call` are served; there is no
//!   way back
//!
//! Notifications (`notifications/*`) are accepted silently in both states.
//! A line that is not JSON gets a parse error with a null id and the loop
//! goes on.

pub mod protocol;
pub mod tools;

use protocol::{RpcError, RpcRequest, RpcResponse, ToolCallParams};
use serde_json::{Value, json};
use speky_core::Specification;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initialized,
}

/// Protocol state of one client connection over a loaded specification.
pub struct Session<'a> {
    spec: &'a Specification,
    state: SessionState,
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(spec: &'a Specification) -> Self {
        Self {
            spec,
            state: SessionState::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one input line. Returns the response line, if any.
    ///
    /// Blank lines and notifications produce nothing.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message)?,
            Err(e) => {
                tracing::error!("Invalid JSON: {}", e);
                RpcResponse::failure(Value::Null, RpcError::parse_error())
            }
        };
        Some(response.to_line())
    }

    /// Handle one decoded message.
    pub fn handle_message(&mut self, message: Value) -> Option<RpcResponse> {
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        let request: RpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => return Some(reject(id, RpcError::invalid_request(&e.to_string()))),
        };

        if request.is_notification() {
            if request.method == "notifications/initialized" {
                tracing::info!("Client initialization complete");
            } else {
                tracing::debug!(method = %request.method, "Notification ignored");
            }
            return None;
        }

        tracing::debug!(method = %request.method, id = %request.id, "Request");
        if request.method == "initialize" {
            self.state = SessionState::Initialized;
            return Some(RpcResponse::success(
                request.id,
                protocol::initialize_result(),
            ));
        }

        if self.state == SessionState::Uninitialized {
            return Some(reject(request.id, RpcError::not_initialized()));
        }

        Some(match request.method.as_str() {
            "tools/list" => RpcResponse::success(request.id, list_tools()),
            "tools/call" => match self.call_tool(request.params) {
                Ok(result) => RpcResponse::success(request.id, result),
                Err(error) => reject(request.id, error),
            },
            method => reject(request.id, RpcError::method_not_found(method)),
        })
    }

    fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let params: ToolCallParams = serde_json::from_value(params)
            .map_err(|e| RpcError::invalid_params(format!("Invalid tools/call params: {e}")))?;
        let tool = tools::find(&params.name).ok_or_else(|| RpcError::tool_not_found(&params.name))?;

        match tool.call(self.spec, params.arguments) {
            Ok(Ok(content)) => Ok(protocol::tool_result(content)),
            Ok(Err(failure)) => {
                tracing::debug!(tool = tool.name, "{}", failure.0);
                Ok(protocol::tool_error(&failure.0))
            }
            Err(e) => Err(RpcError::invalid_params(format!(
                "Invalid arguments for {}: {}",
                tool.name, e
            ))),
        }
    }
}

fn reject(id: Value, error: RpcError) -> RpcResponse {
    tracing::warn!(code = error.code, "{}", error.message);
    RpcResponse::failure(id, error)
}

fn list_tools() -> Value {
    let tools: Vec<Value> = tools::TOOLS
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

// =============================================================================
// SERVER LOOP
// =============================================================================

/// Serve requests from `reader` until end of input.
///
/// Each response is written and flushed before the next line is read. A line
/// that is not UTF-8 gets a parse error like any other malformed line.
pub async fn run_server<R, W>(
    spec: &Specification,
    mut reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!("MCP server ready, waiting for requests");

    let mut session = Session::new(spec);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => session.handle_line(line),
            Err(e) => {
                tracing::error!("Invalid UTF-8 in request line: {}", e);
                Some(RpcResponse::failure(Value::Null, RpcError::parse_error()).to_line())
            }
        };
        if let Some(response) = response {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    tracing::info!("End of input, MCP server stopping");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
