use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};
use weft_core::{AgentConfig, Content, Llm, LlmRequest, Part, Result, WeftError};
use weft_registry::{CapabilityRegistry, RegistrySnapshot};
use weft_session::{ChatTurn, SessionStore, TurnRole};

/// Produces the assistant reply for one inbound user message.
///
/// A turn holds its session's gate for its full duration, so turns within a
/// session are serialized while distinct sessions run in parallel. The model
/// adapter is re-fed the full recorded history on every iteration; capability
/// failures are reified into the conversation rather than aborting the turn.
pub struct TurnExecutor {
    config: Arc<AgentConfig>,
    llm: Arc<dyn Llm>,
    sessions: Arc<SessionStore>,
    registry: Arc<CapabilityRegistry>,
}

impl TurnExecutor {
    pub fn new(
        config: Arc<AgentConfig>,
        llm: Arc<dyn Llm>,
        sessions: Arc<SessionStore>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        Self { config, llm, sessions, registry }
    }

    /// Run one turn. `cancel` flips to true when the owning task is
    /// cancelled; the turn observes it at the next suspension point,
    /// abandoning any in-flight call.
    pub async fn run_turn(
        &self,
        session_id: &str,
        user_text: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<String> {
        let gate = self.sessions.turn_gate(session_id);
        let _turn = gate.lock().await;

        let deadline = Instant::now() + self.config.turn_deadline();
        self.sessions.get_or_create(session_id);
        self.sessions.append(session_id, ChatTurn::user(user_text));

        let snapshot = self.registry.snapshot();
        let system_instruction = self.system_prompt(&snapshot);
        info!(
            session_id,
            functions = snapshot.functions.len(),
            "turn started"
        );

        let mut calls_used: u32 = 0;
        loop {
            if *cancel.borrow() {
                return Err(WeftError::Cancelled);
            }

            let request = LlmRequest {
                model: self.config.llm_model.clone(),
                system_instruction: system_instruction.clone(),
                contents: contents_from_history(&self.sessions.snapshot(session_id)),
                functions: snapshot.functions.clone(),
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WeftError::Timeout("turn deadline elapsed".into()));
            }
            let response = tokio::select! {
                outcome = tokio::time::timeout(remaining, self.llm.generate(request)) => {
                    outcome.map_err(|_| WeftError::Timeout("turn deadline elapsed".into()))??
                }
                _ = cancel_signal(&mut cancel) => return Err(WeftError::Cancelled),
            };

            let calls = response.function_calls();
            if calls.is_empty() {
                let reply = response.final_text();
                self.sessions.append(session_id, ChatTurn::assistant(reply.clone()));
                info!(session_id, calls_used, "turn complete");
                return Ok(reply);
            }

            for (key, args) in calls {
                calls_used += 1;
                if calls_used > self.config.max_tool_calls_per_turn {
                    return Err(WeftError::CapacityExceeded(format!(
                        "turn exceeded {} capability calls",
                        self.config.max_tool_calls_per_turn
                    )));
                }

                self.sessions
                    .append(session_id, ChatTurn::capability_call(&key, args.clone()));

                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(WeftError::Timeout("turn deadline elapsed".into()));
                }
                let outcome = tokio::select! {
                    outcome = self.registry.invoke(&key, args, remaining) => outcome,
                    _ = cancel_signal(&mut cancel) => return Err(WeftError::Cancelled),
                };

                match outcome {
                    Ok(result) => {
                        self.sessions
                            .append(session_id, ChatTurn::capability_result(&key, result));
                    }
                    Err(err) if err.is_fatal_to_turn() => return Err(err),
                    Err(err) => {
                        warn!(session_id, capability = %key, error = %err, "capability call failed");
                        self.sessions
                            .append(session_id, ChatTurn::capability_error(&key, &err));
                    }
                }
            }
        }
    }

    fn system_prompt(&self, snapshot: &RegistrySnapshot) -> String {
        let mut prompt = self.config.base_system_prompt.clone();
        if !self.config.personality.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.config.personality);
        }
        prompt.push_str("\n\nAvailable capabilities: ");
        if snapshot.functions.is_empty() {
            prompt.push_str("none attached.");
        } else {
            for function in &snapshot.functions {
                prompt.push_str(&format!("\n- {}: {}", function.name, function.description));
            }
        }
        prompt
    }
}

/// Resolves when the cancel flag flips to true; never resolves once the
/// sender is gone (an orphaned turn just runs to its deadline).
async fn cancel_signal(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Map the recorded history into model-adapter contents, preserving order.
fn contents_from_history(history: &[ChatTurn]) -> Vec<Content> {
    history
        .iter()
        .map(|turn| match turn.role {
            TurnRole::User => Content::new("user").with_text(&turn.content),
            TurnRole::Assistant => Content::new("model").with_text(&turn.content),
            TurnRole::CapabilityCall => Content::new("model").with_part(Part::function_call(
                turn.capability.clone().unwrap_or_default(),
                turn.payload.clone().unwrap_or(serde_json::Value::Null),
            )),
            TurnRole::CapabilityResult => Content::new("function").with_part(
                Part::function_response(
                    turn.capability.clone().unwrap_or_default(),
                    turn.payload.clone().unwrap_or(serde_json::Value::Null),
                ),
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_mapping_preserves_order_and_roles() {
        let history = vec![
            ChatTurn::user("hi"),
            ChatTurn::capability_call("echo", serde_json::json!({"text": "hi"})),
            ChatTurn::capability_result("echo", serde_json::json!("hi")),
            ChatTurn::assistant("done"),
        ];
        let contents = contents_from_history(&history);
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert_eq!(contents[2].role, "function");
        assert_eq!(contents[3].role, "model");
        assert!(matches!(contents[1].parts[0], Part::FunctionCall { .. }));
        assert!(matches!(contents[2].parts[0], Part::FunctionResponse { .. }));
    }
}
