use crate::ToolDescriptor;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use weft_core::rpc::{JsonRpcRequest, JsonRpcResponse};
use weft_core::{Result, WeftError};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "Mcp-Session-Id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Client for one remote tool endpoint speaking JSON-RPC over streamable HTTP.
///
/// Responses arrive either as a plain JSON body or as a Server-Sent-Events
/// stream whose `data:` lines carry one JSON-RPC response; both are accepted
/// indistinguishably. Stateful servers hand out an `Mcp-Session-Id` on
/// `initialize`; the client then acknowledges with a
/// `notifications/initialized` notification and carries the header on every
/// later call. No retries happen at this layer.
#[derive(Clone, Debug)]
pub struct McpClient {
    http: reqwest::Client,
    endpoint: String,
    server_name: Option<String>,
    session_id: Option<String>,
}

impl McpClient {
    /// Connect to a remote tool endpoint, performing the `initialize`
    /// handshake. The session dance only happens when the server returned a
    /// session id.
    pub async fn connect(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut client = Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            server_name: None,
            session_id: None,
        };

        let request = JsonRpcRequest::new(
            "initialize",
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {
                    "roots": { "listChanged": true },
                    "sampling": {}
                },
                "clientInfo": {
                    "name": "weft",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        );

        let send = client
            .http
            .post(&client.endpoint)
            .header(reqwest::header::ACCEPT, ACCEPT_BOTH)
            .json(&request)
            .send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| WeftError::Timeout(format!("initialize to {}", client.endpoint)))?
            .map_err(transport_error)?;

        client.session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let result = rpc_result(decode_response(response).await?)?;
        client.server_name = result
            .pointer("/serverInfo/name")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());

        if client.session_id.is_some() {
            debug!(endpoint = %client.endpoint, "stateful endpoint, acknowledging session");
            client.send_initialized(timeout).await?;
        }

        Ok(client)
    }

    /// `notifications/initialized`, carrying the session header. Notifications
    /// have no id and any response body is ignored.
    async fn send_initialized(&self, timeout: Duration) -> Result<()> {
        let notification = JsonRpcRequest::notification("notifications/initialized");
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, ACCEPT_BOTH)
            .json(&notification);
        if let Some(session) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session);
        }
        tokio::time::timeout(timeout, builder.send())
            .await
            .map_err(|_| WeftError::Timeout(format!("initialized to {}", self.endpoint)))?
            .map_err(transport_error)?;
        Ok(())
    }

    /// Fetch the tool schemas declared by the remote server.
    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<ToolDescriptor>> {
        let result = self.post_rpc("tools/list", json!({}), timeout).await?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| WeftError::Protocol("tools/list result without tools".into()))?;
        serde_json::from_value(tools)
            .map_err(|e| WeftError::Protocol(format!("malformed tool descriptors: {}", e)))
    }

    /// Invoke one remote tool. A result flagged `isError` surfaces as a
    /// remote error with the server's text preserved.
    pub async fn call_tool(&self, name: &str, args: Value, timeout: Duration) -> Result<Value> {
        let result = self
            .post_rpc("tools/call", json!({ "name": name, "arguments": args }), timeout)
            .await?;

        if result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Err(WeftError::Remote {
                code: -32000,
                message: flatten_content(&result)
                    .unwrap_or_else(|| format!("tool '{}' reported an error", name)),
                data: None,
            });
        }

        Ok(flatten_content(&result).map(Value::String).unwrap_or(result))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    async fn post_rpc(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let request = JsonRpcRequest::new(method, params);
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, ACCEPT_BOTH)
            .json(&request);
        if let Some(session) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = tokio::time::timeout(timeout, builder.send())
            .await
            .map_err(|_| WeftError::Timeout(format!("{} to {}", method, self.endpoint)))?
            .map_err(transport_error)?;

        rpc_result(decode_response(response).await?)
    }
}

fn transport_error(err: reqwest::Error) -> WeftError {
    if err.is_timeout() {
        WeftError::Timeout(err.to_string())
    } else {
        WeftError::Transport(err.to_string())
    }
}

/// Decode an HTTP response as a JSON-RPC response, accepting both plain JSON
/// bodies and SSE framing. A non-2xx status with a decodable JSON-RPC error
/// body is preserved; anything else is a transport failure.
async fn decode_response(response: reqwest::Response) -> Result<JsonRpcResponse> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let body = response.text().await.map_err(transport_error)?;

    let payload = if content_type.starts_with("text/event-stream") {
        decode_sse_body(&body)
            .ok_or_else(|| WeftError::Transport("SSE stream carried no data lines".into()))?
    } else {
        body
    };

    match serde_json::from_str::<JsonRpcResponse>(&payload) {
        Ok(decoded) => Ok(decoded),
        Err(_) if !status.is_success() => {
            Err(WeftError::Transport(format!("HTTP {}: {}", status, payload.trim())))
        }
        Err(e) => Err(WeftError::Protocol(format!("not a JSON-RPC response: {}", e))),
    }
}

fn rpc_result(response: JsonRpcResponse) -> Result<Value> {
    if let Some(error) = response.error {
        return Err(WeftError::Remote {
            code: error.code,
            message: error.message,
            data: error.data,
        });
    }
    response
        .result
        .ok_or_else(|| WeftError::Protocol("JSON-RPC response without result or error".into()))
}

/// Concatenate the `data:` lines of an SSE body into one payload.
fn decode_sse_body(body: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            lines.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Collapse a `tools/call` result's `content` array into its text, if any.
fn flatten_content(result: &Value) -> Option<String> {
    let content = result.get("content")?.as_array()?;
    let mut parts = Vec::new();
    for item in content {
        if item.get("type").and_then(|v| v.as_str()) == Some("text") {
            if let Some(text) = item.get("text").and_then(|v| v.as_str()) {
                parts.push(text.to_string());
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}
