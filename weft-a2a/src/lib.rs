pub mod client;
pub mod types;

pub use client::PeerClient;
pub use types::{AgentCard, AgentCardBuilder, AgentSkill, WELL_KNOWN_CARD_PATH};
