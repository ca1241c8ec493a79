use serde::{Deserialize, Serialize};
use weft_core::rpc::methods;

/// Path every agent serves its card at.
pub const WELL_KNOWN_CARD_PATH: &str = "/.well-known/agent-card.json";

pub const TRANSPORT_HTTP_JSONRPC: &str = "http+json-rpc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl AgentSkill {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
}

/// The public self-description served at the well-known path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    #[serde(rename = "agentId", default)]
    pub agent_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub greeting: String,
    #[serde(default)]
    pub instructions: String,
    pub version: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
    pub transport: String,
    pub auth: String,
    #[serde(rename = "supportsStreaming")]
    pub supports_streaming: bool,
    #[serde(rename = "supportedMethods", default)]
    pub supported_methods: Vec<String>,
}

impl AgentCard {
    pub fn builder() -> AgentCardBuilder {
        AgentCardBuilder::default()
    }
}

#[derive(Default)]
pub struct AgentCardBuilder {
    name: Option<String>,
    agent_id: Option<String>,
    description: Option<String>,
    greeting: Option<String>,
    instructions: Option<String>,
    version: Option<String>,
    url: Option<String>,
    skills: Vec<AgentSkill>,
}

impl AgentCardBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn skills(mut self, skills: Vec<AgentSkill>) -> Self {
        self.skills = skills;
        self
    }

    pub fn build(self) -> AgentCard {
        AgentCard {
            name: self.name.unwrap_or_default(),
            agent_id: self.agent_id.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            greeting: self.greeting.unwrap_or_default(),
            instructions: self.instructions.unwrap_or_default(),
            version: self.version.unwrap_or_else(|| "1.0.0".to_string()),
            url: self.url.unwrap_or_default(),
            skills: self.skills,
            transport: TRANSPORT_HTTP_JSONRPC.to_string(),
            auth: "none".to_string(),
            supports_streaming: false,
            supported_methods: methods::ALL.iter().map(|m| m.to_string()).collect(),
        }
    }
}
