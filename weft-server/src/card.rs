use std::sync::{Arc, RwLock};
use weft_a2a::{AgentCard, AgentSkill};
use weft_core::AgentConfig;
use weft_registry::CapabilityRegistry;

/// Project the public card from static config plus the current registry
/// snapshot. Every exposed function key becomes one skill entry, so tool
/// names map one-to-one and peer skills arrive already namespaced by the
/// peer's addressable name.
pub fn build_agent_card(config: &AgentConfig, registry: &CapabilityRegistry) -> AgentCard {
    let mut skills: Vec<AgentSkill> = registry
        .list()
        .into_iter()
        .flat_map(|capability| capability.functions)
        .map(|function| AgentSkill::new(function.name, function.description))
        .collect();
    skills.push(AgentSkill::new(
        "general_conversation",
        "General conversational replies from the configured model",
    ));

    AgentCard::builder()
        .name(config.display_name.clone())
        .agent_id(config.agent_id.clone())
        .description(config.description.clone())
        .greeting(config.greeting.clone())
        .instructions(config.instructions.clone())
        .version(config.version.clone())
        .url(format!("http://0.0.0.0:{}/", config.port))
        .skills(skills)
        .build()
}

/// Lazily re-rendered card: any registry change invalidates the cache, and
/// the next read renders against the new snapshot before returning.
pub struct CardCache {
    config: Arc<AgentConfig>,
    registry: Arc<CapabilityRegistry>,
    cached: RwLock<(u64, AgentCard)>,
}

impl CardCache {
    pub fn new(config: Arc<AgentConfig>, registry: Arc<CapabilityRegistry>) -> Self {
        let card = build_agent_card(&config, &registry);
        let generation = registry.generation();
        Self { config, registry, cached: RwLock::new((generation, card)) }
    }

    pub fn current(&self) -> AgentCard {
        let generation = self.registry.generation();
        {
            let cached = self.cached.read().unwrap();
            if cached.0 == generation {
                return cached.1.clone();
            }
        }

        let card = build_agent_card(&self.config, &self.registry);
        let mut cached = self.cached.write().unwrap();
        // a later render may already have landed; keep whichever is newest
        if cached.0 <= generation {
            *cached = (generation, card.clone());
        }
        card
    }
}
