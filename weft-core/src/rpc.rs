use crate::WeftError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(Value::String(uuid::Uuid::new_v4().to_string())),
        }
    }

    /// A request without an `id`: JSON-RPC notifications expect no response.
    pub fn notification(method: impl Into<String>) -> Self {
        Self { jsonrpc: "2.0".to_string(), method: method.into(), params: None, id: None }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: Some(result), error: None, id }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), result: None, error: Some(error), id }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Error codes in the implementation-reserved range used by the runtime.
pub mod codes {
    pub const TRANSPORT: i64 = -32001;
    pub const REMOTE: i64 = -32002;
    pub const UNKNOWN_CAPABILITY: i64 = -32003;
    pub const LLM: i64 = -32004;
    pub const TIMEOUT: i64 = -32005;
    pub const CANCELLED: i64 = -32006;
    pub const CAPACITY_EXCEEDED: i64 = -32007;
    pub const NOT_FOUND: i64 = -32008;
}

impl JsonRpcError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self { code: -32700, message: message.into(), data: None }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self { code: -32600, message: message.into(), data: None }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self { code: -32601, message: format!("Method not found: {}", method), data: None }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self { code: -32602, message: message.into(), data: None }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self { code: -32603, message: message.into(), data: None }
    }
}

impl From<&WeftError> for JsonRpcError {
    fn from(err: &WeftError) -> Self {
        let (code, data) = match err {
            WeftError::Transport(_) => (codes::TRANSPORT, None),
            WeftError::Remote { code, data, .. } => (
                codes::REMOTE,
                Some(serde_json::json!({ "remoteCode": code, "remoteData": data })),
            ),
            WeftError::Protocol(_) => (-32600, None),
            WeftError::UnknownCapability(_) => (codes::UNKNOWN_CAPABILITY, None),
            WeftError::Llm(_) => (codes::LLM, None),
            WeftError::Timeout(_) => (codes::TIMEOUT, None),
            WeftError::Cancelled => (codes::CANCELLED, None),
            WeftError::CapacityExceeded(_) => (codes::CAPACITY_EXCEEDED, None),
            WeftError::NotFound(_) => (codes::NOT_FOUND, None),
            WeftError::Reject(_) => (-32602, None),
            WeftError::Config(_) | WeftError::Io(_) | WeftError::Serde(_) => (-32603, None),
        };
        Self { code, message: err.to_string(), data }
    }
}

/// JSON-RPC method names of the agent surface.
pub mod methods {
    pub const MESSAGE_SEND: &str = "message/send";
    pub const SEND_TASK: &str = "send-task";
    pub const TASKS_GET: &str = "tasks/get";
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    pub const TOOLS_ADD: &str = "tools/add";
    pub const TOOLS_REMOVE: &str = "tools/remove";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_HISTORY: &str = "tools/history";
    pub const AGENTS_ADD: &str = "agents/add";
    pub const AGENTS_REMOVE: &str = "agents/remove";
    pub const AGENTS_LIST: &str = "agents/list";
    pub const AGENTS_HISTORY: &str = "agents/history";

    pub const ALL: &[&str] = &[
        MESSAGE_SEND,
        SEND_TASK,
        TASKS_GET,
        TASKS_CANCEL,
        TOOLS_ADD,
        TOOLS_REMOVE,
        TOOLS_LIST,
        TOOLS_HISTORY,
        AGENTS_ADD,
        AGENTS_REMOVE,
        AGENTS_LIST,
        AGENTS_HISTORY,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonrpc_request_parse() {
        let json = r#"{"jsonrpc":"2.0","method":"message/send","params":{},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "message/send");
        assert_eq!(req.id, Some(Value::Number(1.into())));
    }

    #[test]
    fn test_jsonrpc_request_without_id_is_notification() {
        let json = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(req.id.is_none());
        assert!(req.params.is_none());
    }

    #[test]
    fn test_jsonrpc_response_success() {
        let resp =
            JsonRpcResponse::success(Some(Value::Number(1.into())), Value::String("ok".into()));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_jsonrpc_response_error() {
        let resp = JsonRpcResponse::error(
            Some(Value::Number(1.into())),
            JsonRpcError::method_not_found("unknown"),
        );
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[test]
    fn test_error_code_mapping() {
        let err = WeftError::Timeout("turn".into());
        let rpc: JsonRpcError = (&err).into();
        assert_eq!(rpc.code, codes::TIMEOUT);

        let err = WeftError::Remote { code: 17, message: "nope".into(), data: None };
        let rpc: JsonRpcError = (&err).into();
        assert_eq!(rpc.code, codes::REMOTE);
        assert_eq!(rpc.data.unwrap()["remoteCode"], 17);
    }

    #[test]
    fn test_fresh_request_ids() {
        let a = JsonRpcRequest::new("tools/list", Value::Null);
        let b = JsonRpcRequest::new("tools/list", Value::Null);
        assert_ne!(a.id, b.id);
    }
}
