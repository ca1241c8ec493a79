use crate::{AgentCard, WELL_KNOWN_CARD_PATH};
use serde_json::{json, Value};
use std::time::Duration;
use weft_core::rpc::{methods, JsonRpcRequest, JsonRpcResponse};
use weft_core::{Result, WeftError};

/// Client for talking to another agent over its JSON-RPC surface.
///
/// Shares the framing, error taxonomy and deadline contract of the tool
/// client. Peer invocations never share this agent's sessions: callers pass
/// a fresh or deliberately chosen session id.
#[derive(Clone, Default)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and decode the card at the peer's well-known path.
    pub async fn fetch_agent_card(&self, base_url: &str, timeout: Duration) -> Result<AgentCard> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), WELL_KNOWN_CARD_PATH);
        let response = tokio::time::timeout(timeout, self.http.get(&url).send())
            .await
            .map_err(|_| WeftError::Timeout(format!("agent card from {}", url)))?
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(WeftError::Transport(format!(
                "agent card fetch failed: HTTP {}",
                response.status()
            )));
        }

        response
            .json::<AgentCard>()
            .await
            .map_err(|e| WeftError::Protocol(format!("malformed agent card: {}", e)))
    }

    /// Send one user message and extract the final agent reply text.
    pub async fn send_message(
        &self,
        base_url: &str,
        text: &str,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> Result<String> {
        let session_id = session_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let request = JsonRpcRequest::new(
            methods::MESSAGE_SEND,
            json!({
                "message": { "content": text },
                "sessionId": session_id
            }),
        );

        let url = format!("{}/", base_url.trim_end_matches('/'));
        let send = self.http.post(&url).json(&request).send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| WeftError::Timeout(format!("message/send to {}", url)))?
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(WeftError::Transport(format!(
                "message/send failed: HTTP {}",
                response.status()
            )));
        }

        let decoded: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| WeftError::Protocol(format!("not a JSON-RPC response: {}", e)))?;

        if let Some(error) = decoded.error {
            return Err(WeftError::Remote {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        let result = decoded
            .result
            .ok_or_else(|| WeftError::Protocol("response without result or error".into()))?;
        extract_reply(&result)
    }
}

/// Pull the terminal reply out of a `message/send` result, preserving an
/// embedded failure as a remote error.
fn extract_reply(result: &Value) -> Result<String> {
    let status = result.get("status").and_then(|v| v.as_str()).unwrap_or_default();
    if status != "completed" {
        let (code, message) = match result.get("error") {
            Some(err) => (
                err.get("code").and_then(|v| v.as_i64()).unwrap_or(-32000),
                err.get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("peer task did not complete")
                    .to_string(),
            ),
            None => (-32000, format!("peer task ended as '{}'", status)),
        };
        return Err(WeftError::Remote { code, message, data: Some(result.clone()) });
    }

    result
        .pointer("/result/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| WeftError::Protocol("completed task without reply content".into()))
}

fn transport_error(err: reqwest::Error) -> WeftError {
    if err.is_timeout() {
        WeftError::Timeout(err.to_string())
    } else {
        WeftError::Transport(err.to_string())
    }
}
