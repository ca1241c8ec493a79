use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use weft_a2a::{AgentCard, AgentSkill};
use weft_agent::MockLlm;
use weft_core::AgentConfig;
use weft_server::{create_app, AppState};
use weft_session::TurnRole;

/// Fake tool server: `echo` answers immediately, `nap` sleeps five seconds.
async fn tool_handle(body: String) -> impl IntoResponse {
    let request: Value = serde_json::from_str(&body).unwrap();
    let id = request["id"].clone();
    match request["method"].as_str().unwrap_or_default() {
        "initialize" => axum::Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2024-11-05",
                "serverInfo": { "name": "test_tools", "version": "0.0.1" }
            }
        })),
        "tools/list" => axum::Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "tools": [
                    {
                        "name": "echo",
                        "description": "Echo text back",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "text": { "type": "string" } }
                        }
                    },
                    {
                        "name": "nap",
                        "description": "Sleep then answer",
                        "inputSchema": { "type": "object", "properties": {} }
                    },
                    {
                        "name": "double",
                        "description": "Double a number",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "value": { "type": "number" } }
                        }
                    }
                ]
            }
        })),
        "tools/call" => {
            let name = request["params"]["name"].as_str().unwrap_or_default();
            let args = &request["params"]["arguments"];
            let text = match name {
                "nap" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "woke up".to_string()
                }
                "double" => {
                    let value = args["value"].as_f64().unwrap_or_default();
                    format!("{}", value * 2.0)
                }
                _ => args["text"].as_str().unwrap_or_default().to_string(),
            };
            axum::Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{ "type": "text", "text": text }] }
            }))
        }
        method => axum::Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("Method not found: {}", method) }
        })),
    }
}

async fn spawn_tool_server() -> String {
    let app = Router::new().route("/mcp", post(tool_handle));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/mcp", addr)
}

async fn spawn_peer(card: AgentCard, reply: &'static str) -> String {
    async fn peer_rpc(body: String, reply: &'static str) -> impl IntoResponse {
        let request: Value = serde_json::from_str(&body).unwrap();
        axum::Json(json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "result": {
                "taskId": "peer-task",
                "status": "completed",
                "result": { "message": { "role": "agent", "content": reply } }
            }
        }))
    }

    let app = Router::new()
        .route(
            "/.well-known/agent-card.json",
            get({
                let card = card.clone();
                move || async move { axum::Json(card) }
            }),
        )
        .route("/", post(move |body: String| peer_rpc(body, reply)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn test_state(llm: MockLlm) -> AppState {
    let config = AgentConfig {
        agent_id: "test-agent".into(),
        display_name: "Test Agent".into(),
        ..AgentConfig::default()
    };
    AppState::new(config, Arc::new(llm))
}

async fn rpc(app: axum::Router, body: Value) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn fetch_card_skills(app: axum::Router) -> Vec<String> {
    let request = Request::builder()
        .method("GET")
        .uri("/.well-known/agent-card.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let card: Value = serde_json::from_slice(&bytes).unwrap();
    card["skills"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect()
}

/// Add a tool, call it in a turn, remove it, and watch the card follow.
#[tokio::test]
async fn tool_lifecycle_updates_card_turn_and_audit() {
    let tool_url = spawn_tool_server().await;
    let llm = MockLlm::new("m")
        .with_call("echo", json!({ "text": "hello" }))
        .with_reply("the tool said hello");
    let state = test_state(llm);
    let app = create_app(state.clone());

    // add
    let added = rpc(
        app.clone(),
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/add",
            "params": { "url": tool_url }
        }),
    )
    .await;
    assert_eq!(added["result"]["kind"], "tool_provider");
    assert!(added["result"]["functions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "echo"));

    // the card observes the new skills immediately
    let skills = fetch_card_skills(app.clone()).await;
    assert!(skills.contains(&"echo".to_string()));

    // one turn that uses the tool
    let sent = rpc(
        app.clone(),
        json!({
            "jsonrpc": "2.0", "id": 2, "method": "message/send",
            "params": { "message": { "content": "please echo hello" }, "sessionId": "s2" }
        }),
    )
    .await;
    let reply = sent["result"]["result"]["message"]["content"].as_str().unwrap();
    assert!(reply.contains("hello"));

    let history = state.sessions.snapshot("s2");
    let roles: Vec<TurnRole> = history.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![
            TurnRole::User,
            TurnRole::CapabilityCall,
            TurnRole::CapabilityResult,
            TurnRole::Assistant
        ]
    );

    // remove, and the card follows
    let removed = rpc(
        app.clone(),
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/remove",
            "params": { "url": tool_url }
        }),
    )
    .await;
    assert_eq!(removed["result"]["removed"], true);
    let skills = fetch_card_skills(app.clone()).await;
    assert!(!skills.contains(&"echo".to_string()));

    // audit trail: add then remove, both preserving sessions
    let audited = rpc(
        app,
        json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/history", "params": {} }),
    )
    .await;
    let entries = audited["result"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "add");
    assert_eq!(entries[0]["url"], tool_url.as_str());
    assert_eq!(entries[1]["action"], "remove");
    assert!(entries.iter().all(|e| e["session_preserved"] == true));
}

/// Session history survives capability changes verbatim.
#[tokio::test]
async fn session_continuity_across_capability_change() {
    let tool_url = spawn_tool_server().await;
    let llm = MockLlm::new("m")
        .with_reply("Noted, you told me 42.")
        .with_call("double", json!({ "value": 42 }))
        .with_reply("Doubling what you told me gives 84.");
    let state = test_state(llm);
    let app = create_app(state.clone());

    let first = rpc(
        app.clone(),
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "message/send",
            "params": { "message": { "content": "remember 42" }, "sessionId": "s3" }
        }),
    )
    .await;
    assert_eq!(first["result"]["status"], "completed");

    rpc(
        app.clone(),
        json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/add",
            "params": { "url": tool_url }
        }),
    )
    .await;

    let second = rpc(
        app.clone(),
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "message/send",
            "params": { "message": { "content": "double what I told you" }, "sessionId": "s3" }
        }),
    )
    .await;
    let reply = second["result"]["result"]["message"]["content"].as_str().unwrap();
    assert!(reply.contains("84"));

    // the first exchange still sits verbatim at positions 0 and 1
    let history = state.sessions.snapshot("s3");
    assert_eq!(history[0].role, TurnRole::User);
    assert_eq!(history[0].content, "remember 42");
    assert_eq!(history[1].role, TurnRole::Assistant);
    assert_eq!(history[1].content, "Noted, you told me 42.");
    // and the tool call of the second turn landed after it
    assert!(history[2..].iter().any(|t| t.role == TurnRole::CapabilityCall));
}

/// A peer agent attached through the same add surface is callable in a turn.
#[tokio::test]
async fn peer_agent_is_attached_and_relayed() {
    let card = AgentCard::builder()
        .name("Calc Agent")
        .agent_id("calc-1")
        .skills(vec![AgentSkill::new("arithmetic", "Add and multiply numbers")])
        .build();
    let peer_url = spawn_peer(card, "the answer is 84").await;

    let llm = MockLlm::new("m")
        .with_call("Calc_Agent_arithmetic", json!({ "message": "double 42" }))
        .with_reply("The calculator agent says: the answer is 84");
    let state = test_state(llm);
    let app = create_app(state.clone());

    let added = rpc(
        app.clone(),
        json!({
            "jsonrpc": "2.0", "id": 1, "method": "agents/add",
            "params": { "url": peer_url }
        }),
    )
    .await;
    assert_eq!(added["result"]["kind"], "peer_agent");

    // peer skills appear on the card, namespaced by the peer's name
    let skills = fetch_card_skills(app.clone()).await;
    assert!(skills.contains(&"Calc_Agent_arithmetic".to_string()));

    let sent = rpc(
        app,
        json!({
            "jsonrpc": "2.0", "id": 2, "method": "message/send",
            "params": { "message": { "content": "what is 42 doubled?" }, "sessionId": "s5" }
        }),
    )
    .await;
    let reply = sent["result"]["result"]["message"]["content"].as_str().unwrap();
    assert!(reply.contains("84"));

    // the relay went out as a capability call and came back as its result
    let history = state.sessions.snapshot("s5");
    let call = history.iter().find(|t| t.role == TurnRole::CapabilityCall).unwrap();
    assert_eq!(call.capability.as_deref(), Some("Calc_Agent_arithmetic"));
    let result = history.iter().find(|t| t.role == TurnRole::CapabilityResult).unwrap();
    assert_eq!(result.payload.as_ref().unwrap(), &json!("the answer is 84"));
}

/// Cancelling a working task stops the turn mid-call and keeps the partial
/// history. Needs a live listener: the cancel races the running send.
#[tokio::test]
async fn cancellation_mid_turn_preserves_partial_history() {
    let tool_url = spawn_tool_server().await;
    let llm = MockLlm::new("m").with_call("nap", json!({})).with_reply("never");
    let state = test_state(llm);
    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let base = format!("http://{}", addr);

    let http = reqwest::Client::new();
    http.post(&base)
        .json(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/add",
            "params": { "url": tool_url }
        }))
        .send()
        .await
        .unwrap();

    // start the slow turn with a caller-chosen task id
    let send = {
        let http = http.clone();
        let base = base.clone();
        tokio::spawn(async move {
            http.post(&base)
                .json(&json!({
                    "jsonrpc": "2.0", "id": 2, "method": "message/send",
                    "params": {
                        "message": { "content": "take a nap" },
                        "sessionId": "s6",
                        "taskId": "task-s6"
                    }
                }))
                .send()
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap()
        })
    };

    // give the turn time to reach the tool call, then cancel
    tokio::time::sleep(Duration::from_millis(500)).await;
    let cancelled = http
        .post(&base)
        .json(&json!({
            "jsonrpc": "2.0", "id": 3, "method": "tasks/cancel",
            "params": { "taskId": "task-s6" }
        }))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(cancelled["result"]["status"], "cancelled");

    let sent = send.await.unwrap();
    assert_eq!(sent["result"]["status"], "cancelled");

    // user entry and the abandoned capability call, no assistant entry
    let history = state.sessions.snapshot("s6");
    let roles: Vec<TurnRole> = history.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![TurnRole::User, TurnRole::CapabilityCall]);

    let record = state.tasks.get("task-s6").unwrap();
    assert_eq!(record.status, weft_server::TaskStatus::Cancelled);
}
