use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_TOOL_CALLS_PER_TURN: u32 = 16;
pub const DEFAULT_TURN_DEADLINE_MS: u64 = 120_000;
pub const DEFAULT_PORT: u16 = 5000;

/// Immutable per-process agent configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Stable identifier advertised in the card and used as a routing key.
    pub agent_id: String,
    pub display_name: String,
    pub version: String,
    pub description: String,
    pub greeting: String,
    pub instructions: String,
    /// Free-form text appended to the system prompt.
    pub personality: String,
    pub llm_model: String,
    pub base_system_prompt: String,
    pub port: u16,
    /// Attached at startup through the normal add path, in order.
    pub initial_capability_urls: Vec<String>,
    pub max_tool_calls_per_turn: u32,
    pub turn_deadline_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: "weft-agent".to_string(),
            display_name: "Weft Agent".to_string(),
            version: "1.0.0".to_string(),
            description: "A general-purpose agent".to_string(),
            greeting: "Hello! How can I help you?".to_string(),
            instructions: "I can answer questions and call attached capabilities.".to_string(),
            personality: String::new(),
            llm_model: "mock".to_string(),
            base_system_prompt: "You are a helpful assistant.".to_string(),
            port: DEFAULT_PORT,
            initial_capability_urls: Vec::new(),
            max_tool_calls_per_turn: DEFAULT_MAX_TOOL_CALLS_PER_TURN,
            turn_deadline_ms: DEFAULT_TURN_DEADLINE_MS,
        }
    }
}

impl AgentConfig {
    pub fn turn_deadline(&self) -> Duration {
        Duration::from_millis(self.turn_deadline_ms)
    }

    /// Display name reduced to a valid identifier for namespacing.
    pub fn sanitized_name(&self) -> String {
        sanitize_identifier(&self.display_name)
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}
