use serde::{Deserialize, Serialize};
use serde_json::json;
use weft_a2a::{AgentCard, PeerClient};
use weft_core::sanitize_identifier;
use weft_mcp::{McpClient, ToolDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    ToolProvider,
    PeerAgent,
}

/// In-process representation of one attached capability. The handle owns its
/// transport state; dropping it releases the connection on every exit path.
pub enum CapabilityHandle {
    ToolProvider {
        url: String,
        declared_name: String,
        tools: Vec<ToolDescriptor>,
        client: McpClient,
    },
    PeerAgent {
        url: String,
        card: AgentCard,
        addressable_as: String,
        client: PeerClient,
    },
}

/// How an exposed function key reaches its remote end. Cloned out of the
/// registry so an in-flight invocation survives concurrent removal.
#[derive(Clone)]
pub enum InvokeTarget {
    Tool { client: McpClient, tool_name: String },
    Peer { client: PeerClient, base_url: String },
}

/// One function a handle wants to expose, before registry-wide key dedup.
pub struct FunctionSpec {
    pub base_name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub target: InvokeTarget,
}

impl CapabilityHandle {
    pub fn url(&self) -> &str {
        match self {
            CapabilityHandle::ToolProvider { url, .. } => url,
            CapabilityHandle::PeerAgent { url, .. } => url,
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityHandle::ToolProvider { .. } => CapabilityKind::ToolProvider,
            CapabilityHandle::PeerAgent { .. } => CapabilityKind::PeerAgent,
        }
    }

    /// Key used to disambiguate colliding function names.
    pub fn scope_key(&self) -> String {
        match self {
            CapabilityHandle::ToolProvider { declared_name, .. } => {
                sanitize_identifier(declared_name)
            }
            CapabilityHandle::PeerAgent { addressable_as, .. } => addressable_as.clone(),
        }
    }

    /// The functions this handle contributes, in declaration order. Tool
    /// providers expose one function per remote tool; a peer exposes one
    /// function per skill of its cached card, namespaced by the peer's
    /// addressable name and taking a single `message` argument.
    pub fn function_specs(&self) -> Vec<FunctionSpec> {
        match self {
            CapabilityHandle::ToolProvider { tools, client, .. } => tools
                .iter()
                .map(|tool| FunctionSpec {
                    base_name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                    target: InvokeTarget::Tool {
                        client: client.clone(),
                        tool_name: tool.name.clone(),
                    },
                })
                .collect(),
            CapabilityHandle::PeerAgent { url, card, addressable_as, client } => card
                .skills
                .iter()
                .map(|skill| FunctionSpec {
                    base_name: format!("{}_{}", addressable_as, sanitize_identifier(&skill.name)),
                    description: format!("Ask agent '{}': {}", card.name, skill.description),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "message": {
                                "type": "string",
                                "description": "The request to send to the agent"
                            }
                        },
                        "required": ["message"]
                    }),
                    target: InvokeTarget::Peer {
                        client: client.clone(),
                        base_url: url.clone(),
                    },
                })
                .collect(),
        }
    }
}
