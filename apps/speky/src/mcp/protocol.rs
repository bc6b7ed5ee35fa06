//! # JSON-RPC Envelopes
//!
//! Request and response shapes for the line protocol, the reserved error
//! codes, and the two tool result payloads (success and in-band failure).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Protocol revision announced by `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-11-25";

/// Server name announced by `initialize`.
pub const SERVER_NAME: &str = "speky-mcp";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Not part of JSON-RPC itself: any request other than `initialize` before
/// the session is initialized.
pub const SERVER_NOT_INITIALIZED: i64 = -32002;

// =============================================================================
// REQUEST
// =============================================================================

/// One decoded request line.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// Correlation id, echoed back. Null when absent.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Notifications never get a response.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.method.starts_with("notifications/")
    }
}

/// `params` of a `tools/call` request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

// =============================================================================
// RESPONSE
// =============================================================================

/// A protocol-level error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    #[must_use]
    pub fn invalid_request(reason: &str) -> Self {
        Self::new(INVALID_REQUEST, format!("Invalid request: {reason}"))
    }

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    #[must_use]
    pub fn tool_not_found(name: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Tool not found: {name}"))
    }

    #[must_use]
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, reason)
    }

    #[must_use]
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, reason)
    }

    #[must_use]
    pub fn not_initialized() -> Self {
        Self::new(SERVER_NOT_INITIALIZED, "Server not initialized")
    }
}

/// One response line. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Render as a single line of JSON with object keys sorted.
    #[must_use]
    pub fn to_line(&self) -> String {
        match serde_json::to_value(self) {
            Ok(value) => value.to_string(),
            Err(e) => json!({
                "error": RpcError::internal(e.to_string()),
                "id": self.id,
                "jsonrpc": "2.0",
            })
            .to_string(),
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Result of `initialize`.
#[must_use]
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

/// Successful tool call.
#[must_use]
pub fn tool_result(content: Value) -> Value {
    json!({ "structuredContent": content })
}

/// Tool call that ran but reports a domain failure.
#[must_use]
pub fn tool_error(message: &str) -> Value {
    json!({
        "isError": true,
        "structuredContent": { "error": message },
    })
}

// =============================================================================
// TESTS
// =============================================================================
