use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnRole {
    User,
    Assistant,
    CapabilityCall,
    CapabilityResult,
}

/// One entry of a session's conversation history.
///
/// Capability entries carry the registry key of the capability plus the call
/// arguments or the (possibly failed) result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            capability: None,
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn capability_call(key: impl Into<String>, args: Value) -> Self {
        let key = key.into();
        let mut turn = Self::new(TurnRole::CapabilityCall, key.clone());
        turn.capability = Some(key);
        turn.payload = Some(args);
        turn
    }

    pub fn capability_result(key: impl Into<String>, result: Value) -> Self {
        let key = key.into();
        let mut turn = Self::new(TurnRole::CapabilityResult, key.clone());
        turn.capability = Some(key);
        turn.payload = Some(result);
        turn
    }

    /// A failed capability call, reified so the model can react to it.
    pub fn capability_error(key: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::capability_result(key, serde_json::json!({ "error": error.to_string() }))
    }

    pub fn is_error_result(&self) -> bool {
        self.role == TurnRole::CapabilityResult
            && self.payload.as_ref().map(|p| p.get("error").is_some()).unwrap_or(false)
    }
}
