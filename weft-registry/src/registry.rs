use crate::handle::{CapabilityHandle, CapabilityKind, InvokeTarget};
use crate::history::{FunctionSummary, HistoryEntry};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};
use weft_a2a::PeerClient;
use weft_core::{sanitize_identifier, FunctionDeclaration, Result, WeftError};
use weft_mcp::McpClient;

/// One exposed function key bound to its capability. The invoke target is
/// cheap to clone so an in-flight call keeps working after the capability is
/// removed; later calls fail the key lookup instead.
#[derive(Clone)]
pub struct FunctionBinding {
    pub key: String,
    pub url: String,
    pub declaration: FunctionDeclaration,
    pub target: InvokeTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySummary {
    pub url: String,
    pub kind: CapabilityKind,
    pub functions: Vec<FunctionSummary>,
}

/// Consistent point-in-time view handed to the turn executor and the card
/// builder. Function order is the insertion order of handles, each handle's
/// functions in declaration order.
#[derive(Clone)]
pub struct RegistrySnapshot {
    pub generation: u64,
    pub functions: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub url: String,
    pub kind: CapabilityKind,
    pub functions: Vec<String>,
    /// False when the url was already attached (idempotent re-add).
    pub newly_added: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveOutcome {
    pub url: String,
    pub removed: bool,
}

struct RegistryState {
    handles: Vec<CapabilityHandle>,
    bindings: Vec<FunctionBinding>,
    generation: u64,
}

/// Single in-process source of truth for what this agent can call.
///
/// Mutations are serialized against each other; reads see a consistent
/// snapshot. Every successful mutation bumps a generation counter observable
/// through [`CapabilityRegistry::subscribe`] before the mutating call
/// returns.
pub struct CapabilityRegistry {
    agent_id: String,
    probe_client: PeerClient,
    state: RwLock<RegistryState>,
    mutations: tokio::sync::Mutex<()>,
    history: Mutex<Vec<HistoryEntry>>,
    changed: watch::Sender<u64>,
}

impl CapabilityRegistry {
    pub fn new(agent_id: impl Into<String>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            agent_id: agent_id.into(),
            probe_client: PeerClient::new(),
            state: RwLock::new(RegistryState {
                handles: Vec::new(),
                bindings: Vec::new(),
                generation: 0,
            }),
            mutations: tokio::sync::Mutex::new(()),
            history: Mutex::new(Vec::new()),
            changed,
        }
    }

    /// Observe registry generations. The receiver's value moves before the
    /// mutating operation returns to its caller.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().unwrap().generation
    }

    /// Attach the endpoint at `url`, deciding its kind by probing: a
    /// well-formed agent card makes it a peer agent, otherwise a successful
    /// `tools/list` makes it a tool provider. Re-adding an attached url is a
    /// no-op that still records an audit entry.
    pub async fn add(&self, url: &str, deadline: Duration) -> Result<AddOutcome> {
        let _guard = self.mutations.lock().await;

        if let Some(existing) = self.existing_outcome(url) {
            debug!(url, "capability already attached");
            let summary = self.summary_for(url);
            self.history.lock().unwrap().push(HistoryEntry::added(url, summary));
            return Ok(existing);
        }

        let started = Instant::now();
        let handle = match self.probe_client.fetch_agent_card(url, deadline).await {
            Ok(card) => {
                if !self.agent_id.is_empty() && card.agent_id == self.agent_id {
                    return Err(WeftError::Reject(format!(
                        "{} identifies as this agent; refusing self-loop",
                        url
                    )));
                }
                info!(url, peer = %card.name, "attaching peer agent");
                CapabilityHandle::PeerAgent {
                    url: url.to_string(),
                    addressable_as: sanitize_identifier(&card.name),
                    card,
                    client: PeerClient::new(),
                }
            }
            Err(peer_err) => {
                let budget = remaining(deadline, started, url)?;
                let client =
                    McpClient::connect(url, budget).await.map_err(|tool_err| {
                        WeftError::Transport(format!(
                            "{} unreachable as agent ({}) and as tool server ({})",
                            url, peer_err, tool_err
                        ))
                    })?;
                let budget = remaining(deadline, started, url)?;
                let tools = client.list_tools(budget).await?;
                let declared_name = client
                    .server_name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "tool_server".to_string());
                info!(url, server = %declared_name, tools = tools.len(), "attaching tool provider");
                CapabilityHandle::ToolProvider {
                    url: url.to_string(),
                    declared_name,
                    tools,
                    client,
                }
            }
        };

        let kind = handle.kind();
        let generation = {
            let mut state = self.state.write().unwrap();
            state.handles.push(handle);
            state.bindings = rebuild_bindings(&state.handles);
            state.generation += 1;
            state.generation
        };

        let summary = self.summary_for(url);
        let functions = summary.iter().map(|f| f.name.clone()).collect();
        self.history.lock().unwrap().push(HistoryEntry::added(url, summary));
        let _ = self.changed.send(generation);

        Ok(AddOutcome { url: url.to_string(), kind, functions, newly_added: true })
    }

    /// Detach the endpoint at `url`, releasing its transport state. Removing
    /// an absent url is a no-op that still records an audit entry.
    pub async fn remove(&self, url: &str) -> Result<RemoveOutcome> {
        let _guard = self.mutations.lock().await;

        let (removed, generation) = {
            let mut state = self.state.write().unwrap();
            let before = state.handles.len();
            state.handles.retain(|h| h.url() != url);
            let removed = state.handles.len() != before;
            if removed {
                state.bindings = rebuild_bindings(&state.handles);
                state.generation += 1;
            }
            (removed, state.generation)
        };

        self.history.lock().unwrap().push(HistoryEntry::removed(url));
        if removed {
            info!(url, "capability detached");
            let _ = self.changed.send(generation);
        }

        Ok(RemoveOutcome { url: url.to_string(), removed })
    }

    /// Ordered snapshot of the attached capabilities, insertion order.
    pub fn list(&self) -> Vec<CapabilitySummary> {
        let state = self.state.read().unwrap();
        state
            .handles
            .iter()
            .map(|handle| CapabilitySummary {
                url: handle.url().to_string(),
                kind: handle.kind(),
                functions: summarize(&state.bindings, handle.url()),
            })
            .collect()
    }

    /// The full audit log, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap().clone()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read().unwrap();
        RegistrySnapshot {
            generation: state.generation,
            functions: state.bindings.iter().map(|b| b.declaration.clone()).collect(),
        }
    }

    /// Dispatch one function call to the owning capability. Peer functions
    /// take a `message` argument and relay it as a `message/send`.
    pub async fn invoke(&self, key: &str, args: Value, timeout: Duration) -> Result<Value> {
        let target = {
            let state = self.state.read().unwrap();
            state
                .bindings
                .iter()
                .find(|b| b.key == key)
                .map(|b| b.target.clone())
                .ok_or_else(|| WeftError::UnknownCapability(key.to_string()))?
        };

        match target {
            InvokeTarget::Tool { client, tool_name } => {
                client.call_tool(&tool_name, args, timeout).await
            }
            InvokeTarget::Peer { client, base_url } => {
                let text = args
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| args.as_str().map(|s| s.to_string()))
                    .ok_or_else(|| {
                        WeftError::Reject(format!(
                            "peer function '{}' requires a 'message' argument",
                            key
                        ))
                    })?;
                client
                    .send_message(&base_url, &text, None, timeout)
                    .await
                    .map(Value::String)
            }
        }
    }

    fn existing_outcome(&self, url: &str) -> Option<AddOutcome> {
        let state = self.state.read().unwrap();
        let handle = state.handles.iter().find(|h| h.url() == url)?;
        Some(AddOutcome {
            url: url.to_string(),
            kind: handle.kind(),
            functions: state
                .bindings
                .iter()
                .filter(|b| b.url == url)
                .map(|b| b.key.clone())
                .collect(),
            newly_added: false,
        })
    }

    fn summary_for(&self, url: &str) -> Vec<FunctionSummary> {
        summarize(&self.state.read().unwrap().bindings, url)
    }
}

fn remaining(deadline: Duration, started: Instant, url: &str) -> Result<Duration> {
    let left = deadline.saturating_sub(started.elapsed());
    if left.is_zero() {
        Err(WeftError::Timeout(format!("attaching {}", url)))
    } else {
        Ok(left)
    }
}

fn summarize(bindings: &[FunctionBinding], url: &str) -> Vec<FunctionSummary> {
    bindings
        .iter()
        .filter(|b| b.url == url)
        .map(|b| FunctionSummary {
            name: b.key.clone(),
            description: b.declaration.description.clone(),
        })
        .collect()
}

/// Project the keyed dispatch table from the handles, insertion order.
/// Colliding names get the owning capability's scope key prefixed, then a
/// numeric suffix if the collision persists, so keys stay globally unique
/// and deterministic.
fn rebuild_bindings(handles: &[CapabilityHandle]) -> Vec<FunctionBinding> {
    let mut used: HashSet<String> = HashSet::new();
    let mut bindings = Vec::new();

    for handle in handles {
        let scope = handle.scope_key();
        for spec in handle.function_specs() {
            let mut key = spec.base_name.clone();
            if used.contains(&key) {
                key = format!("{}_{}", scope, spec.base_name);
            }
            let mut n = 2;
            while used.contains(&key) {
                key = format!("{}_{}_{}", scope, spec.base_name, n);
                n += 1;
            }
            used.insert(key.clone());
            bindings.push(FunctionBinding {
                declaration: FunctionDeclaration {
                    name: key.clone(),
                    description: spec.description,
                    parameters: spec.parameters,
                },
                key,
                url: handle.url().to_string(),
                target: spec.target,
            });
        }
    }

    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_a2a::{AgentCard, AgentSkill};

    fn peer(url: &str, display_name: &str, skills: &[&str]) -> CapabilityHandle {
        let card = AgentCard::builder()
            .name(display_name)
            .agent_id(format!("{}-id", sanitize_identifier(display_name)))
            .skills(skills.iter().map(|s| AgentSkill::new(*s, format!("{} skill", s))).collect())
            .build();
        CapabilityHandle::PeerAgent {
            url: url.to_string(),
            addressable_as: sanitize_identifier(display_name),
            card,
            client: PeerClient::new(),
        }
    }

    #[test]
    fn test_bindings_preserve_insertion_order() {
        let handles = vec![
            peer("http://a/", "Agent A", &["alpha", "beta"]),
            peer("http://b/", "Agent B", &["gamma"]),
        ];
        let bindings = rebuild_bindings(&handles);
        let keys: Vec<&str> = bindings.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["Agent_A_alpha", "Agent_A_beta", "Agent_B_gamma"]);
    }

    #[test]
    fn test_colliding_keys_stay_unique() {
        // Same display name on two peers produces identical base names; the
        // second gets its scope key prefixed.
        let handles = vec![
            peer("http://a/", "Twin", &["ask"]),
            peer("http://b/", "Twin", &["ask"]),
        ];
        let bindings = rebuild_bindings(&handles);
        assert_eq!(bindings[0].key, "Twin_ask");
        assert_eq!(bindings[1].key, "Twin_Twin_ask");
        assert_eq!(bindings[1].url, "http://b/");

        // However the collisions stack up, keys stay unique.
        let handles = vec![
            peer("http://a/", "Twin", &["ask"]),
            peer("http://b/", "Twin", &["ask"]),
            peer("http://c/", "Twin", &["Twin_ask"]),
        ];
        let keys: Vec<String> =
            rebuild_bindings(&handles).into_iter().map(|b| b.key).collect();
        assert_eq!(keys.len(), 3);
        let unique: std::collections::HashSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn test_invoke_unknown_capability() {
        let registry = CapabilityRegistry::new("me");
        let err = registry
            .invoke("ghost", serde_json::json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WeftError::UnknownCapability(_)));
    }

    #[tokio::test]
    async fn test_remove_absent_records_history() {
        let registry = CapabilityRegistry::new("me");
        let outcome = registry.remove("http://nowhere/").await.unwrap();
        assert!(!outcome.removed);

        let history = registry.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, crate::history::HistoryAction::Remove);
        assert!(history[0].session_preserved);
        // a no-op remove does not move the generation
        assert_eq!(registry.generation(), 0);
    }
}
