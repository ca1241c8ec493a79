use crate::card::CardCache;
use crate::tasks::TaskManager;
use std::sync::Arc;
use tracing::{info, warn};
use weft_agent::TurnExecutor;
use weft_core::{AgentConfig, Llm};
use weft_registry::CapabilityRegistry;
use weft_session::SessionStore;

/// Process-wide shared state: each component carries its own internal
/// synchronization, so handlers clone freely.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<CapabilityRegistry>,
    pub tasks: Arc<TaskManager>,
    pub executor: Arc<TurnExecutor>,
    pub card: Arc<CardCache>,
}

impl AppState {
    pub fn new(config: AgentConfig, llm: Arc<dyn Llm>) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionStore::new());
        let registry = Arc::new(CapabilityRegistry::new(config.agent_id.clone()));
        let tasks = Arc::new(TaskManager::new());
        let executor = Arc::new(TurnExecutor::new(
            config.clone(),
            llm,
            sessions.clone(),
            registry.clone(),
        ));
        let card = Arc::new(CardCache::new(config.clone(), registry.clone()));
        Self { config, sessions, registry, tasks, executor, card }
    }

    /// Attach the configured boot capabilities through the normal add path.
    /// Failures are logged and skipped; the agent still comes up.
    pub async fn attach_initial_capabilities(&self) {
        for url in &self.config.initial_capability_urls {
            match self.registry.add(url, self.config.turn_deadline()).await {
                Ok(outcome) => {
                    info!(url, kind = ?outcome.kind, functions = outcome.functions.len(),
                        "boot capability attached");
                }
                Err(err) => {
                    warn!(url, error = %err, "boot capability skipped");
                }
            }
        }
    }
}
