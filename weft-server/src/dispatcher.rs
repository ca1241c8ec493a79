use crate::state::AppState;
use crate::tasks::{CancelOutcome, TaskStatus};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};
use weft_core::rpc::{methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use weft_core::WeftError;

/// Deadline for resolving a capability endpoint during add.
const REGISTRY_OP_DEADLINE: Duration = Duration::from_secs(30);

/// GET /.well-known/agent-card.json
pub async fn get_agent_card(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.card.current())
}

/// POST / — the JSON-RPC 2.0 surface. The body is decoded by hand so a
/// malformed envelope still gets a JSON-RPC parse error instead of a bare
/// HTTP rejection.
pub async fn handle_jsonrpc(
    State(state): State<AppState>,
    body: String,
) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(JsonRpcResponse::error(None, JsonRpcError::parse_error(e.to_string())));
        }
    };
    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::error(
            request.id,
            JsonRpcError::invalid_request("JSON-RPC 2.0 required"),
        ));
    }

    let JsonRpcRequest { method, params, id, .. } = request;
    match method.as_str() {
        methods::MESSAGE_SEND | methods::SEND_TASK => {
            handle_message_send(&state, params, id).await
        }
        methods::TASKS_GET => handle_tasks_get(&state, params, id),
        methods::TASKS_CANCEL => handle_tasks_cancel(&state, params, id),
        methods::TOOLS_ADD | methods::AGENTS_ADD => {
            handle_capability_add(&state, params, id).await
        }
        methods::TOOLS_REMOVE | methods::AGENTS_REMOVE => {
            handle_capability_remove(&state, params, id).await
        }
        methods::TOOLS_LIST | methods::AGENTS_LIST => {
            respond(id, serde_json::to_value(state.registry.list()).unwrap_or_default())
        }
        methods::TOOLS_HISTORY | methods::AGENTS_HISTORY => {
            respond(id, serde_json::to_value(state.registry.history()).unwrap_or_default())
        }
        other => Json(JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))),
    }
}

/// Inbound message body. `content` is canonical; the legacy `parts` shape is
/// folded into plain text at this boundary and never leaks further in.
#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    parts: Option<Vec<TextPart>>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessageSendParams {
    #[serde(default)]
    message: Option<MessageBody>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
    /// Caller-chosen task id, so the task can be queried or cancelled while
    /// the turn is still running.
    #[serde(default, rename = "taskId")]
    task_id: Option<String>,
    /// The legacy `send-task` shape carries the task id as `id`.
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlParams {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TaskIdParams {
    #[serde(rename = "taskId")]
    task_id: String,
}

fn canonical_text(params: &MessageSendParams) -> Option<String> {
    let message = params.message.as_ref()?;
    if let Some(content) = &message.content {
        return Some(content.clone());
    }
    let parts = message.parts.as_ref()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n"))
}

async fn handle_message_send(
    state: &AppState,
    params: Option<Value>,
    id: Option<Value>,
) -> Json<JsonRpcResponse> {
    let params: MessageSendParams = match decode_params(params) {
        Ok(p) => p,
        Err(error) => return Json(JsonRpcResponse::error(id, error)),
    };
    let Some(text) = canonical_text(&params) else {
        return Json(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_params("message content required"),
        ));
    };
    let session_id =
        params.session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let preset_task_id = params.task_id.or(params.id);

    let (task, cancel_rx) = state.tasks.create(&session_id, &text, preset_task_id);
    let task_id = task.task_id.clone();
    if let Err(err) = state.tasks.start(&task_id) {
        return Json(JsonRpcResponse::error(id, JsonRpcError::from(&err)));
    }

    info!(task_id = %task_id, session_id = %session_id, "task working");
    match state.executor.run_turn(&session_id, &text, cancel_rx).await {
        Ok(reply) => {
            let delivered = state.tasks.complete(&task_id, &reply).unwrap_or(false);
            let status = if delivered { TaskStatus::Completed } else {
                state.tasks.get(&task_id).map(|t| t.status).unwrap_or(TaskStatus::Cancelled)
            };
            respond(
                id,
                json!({
                    "taskId": task_id,
                    "status": status,
                    "result": { "message": { "role": "agent", "content": reply } }
                }),
            )
        }
        Err(WeftError::Cancelled) => {
            // the cancel path already moved the task to its terminal state
            respond(id, json!({ "taskId": task_id, "status": TaskStatus::Cancelled }))
        }
        Err(err) => {
            warn!(task_id = %task_id, error = %err, "turn failed");
            let terse = format!("The agent could not complete this request ({}).", err.kind());
            let _ = state.tasks.fail(&task_id, err.kind(), &terse);
            let rpc_error = JsonRpcError::from(&err);
            respond(
                id,
                json!({
                    "taskId": task_id,
                    "status": TaskStatus::Failed,
                    "error": { "code": rpc_error.code, "message": terse }
                }),
            )
        }
    }
}

fn handle_tasks_get(
    state: &AppState,
    params: Option<Value>,
    id: Option<Value>,
) -> Json<JsonRpcResponse> {
    let params: TaskIdParams = match decode_params(params) {
        Ok(p) => p,
        Err(error) => return Json(JsonRpcResponse::error(id, error)),
    };
    match state.tasks.get(&params.task_id) {
        Ok(task) => respond(id, serde_json::to_value(task).unwrap_or_default()),
        Err(err) => Json(JsonRpcResponse::error(id, JsonRpcError::from(&err))),
    }
}

fn handle_tasks_cancel(
    state: &AppState,
    params: Option<Value>,
    id: Option<Value>,
) -> Json<JsonRpcResponse> {
    let params: TaskIdParams = match decode_params(params) {
        Ok(p) => p,
        Err(error) => return Json(JsonRpcResponse::error(id, error)),
    };
    match state.tasks.cancel(&params.task_id) {
        Ok(CancelOutcome::Cancelled) => {
            info!(task_id = %params.task_id, "task cancelled");
            respond(id, json!({ "taskId": params.task_id, "status": "cancelled" }))
        }
        Ok(CancelOutcome::AlreadyTerminal) => {
            respond(id, json!({ "taskId": params.task_id, "status": "already_terminal" }))
        }
        Err(err) => Json(JsonRpcResponse::error(id, JsonRpcError::from(&err))),
    }
}

async fn handle_capability_add(
    state: &AppState,
    params: Option<Value>,
    id: Option<Value>,
) -> Json<JsonRpcResponse> {
    let params: UrlParams = match decode_params(params) {
        Ok(p) => p,
        Err(error) => return Json(JsonRpcResponse::error(id, error)),
    };
    match state.registry.add(&params.url, REGISTRY_OP_DEADLINE).await {
        Ok(outcome) => respond(id, serde_json::to_value(outcome).unwrap_or_default()),
        Err(err) => Json(JsonRpcResponse::error(id, JsonRpcError::from(&err))),
    }
}

async fn handle_capability_remove(
    state: &AppState,
    params: Option<Value>,
    id: Option<Value>,
) -> Json<JsonRpcResponse> {
    let params: UrlParams = match decode_params(params) {
        Ok(p) => p,
        Err(error) => return Json(JsonRpcResponse::error(id, error)),
    };
    match state.registry.remove(&params.url).await {
        Ok(outcome) => respond(id, serde_json::to_value(outcome).unwrap_or_default()),
        Err(err) => Json(JsonRpcResponse::error(id, JsonRpcError::from(&err))),
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
) -> Result<T, JsonRpcError> {
    match params {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string())),
        None => Err(JsonRpcError::invalid_params("missing params")),
    }
}

fn respond(id: Option<Value>, result: Value) -> Json<JsonRpcResponse> {
    Json(JsonRpcResponse::success(id, result))
}
