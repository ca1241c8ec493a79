use crate::ChatTurn;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Clone)]
struct SessionData {
    history: Vec<ChatTurn>,
    created_at: DateTime<Utc>,
    last_touched_at: DateTime<Utc>,
    metadata: HashMap<String, Value>,
}

impl SessionData {
    fn new() -> Self {
        let now = Utc::now();
        Self { history: Vec::new(), created_at: now, last_touched_at: now, metadata: HashMap::new() }
    }
}

/// Read-only view of one session, cloned out of the store.
#[derive(Clone)]
pub struct SessionView {
    pub session_id: String,
    pub history: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
    pub last_touched_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

/// In-memory session store. History is append-only within a session and
/// never modified by capability topology changes. Unbounded by default; an
/// optional cap evicts the least-recently-touched session.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    capacity: Option<usize>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }

    /// Bound the number of live sessions. Only meant for deployments that
    /// must cap memory; correctness semantics assume the unbounded default.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// A never-before-seen id comes into existence with an empty history.
    pub fn get_or_create(&self, session_id: &str) -> SessionView {
        {
            let sessions = self.sessions.read().unwrap();
            if let Some(data) = sessions.get(session_id) {
                return view(session_id, data);
            }
        }

        let mut sessions = self.sessions.write().unwrap();
        if self.capacity.map(|cap| sessions.len() >= cap).unwrap_or(false)
            && !sessions.contains_key(session_id)
        {
            evict_oldest(&mut sessions);
        }
        let data = sessions.entry(session_id.to_string()).or_insert_with(SessionData::new);
        view(session_id, data)
    }

    pub fn append(&self, session_id: &str, turn: ChatTurn) {
        let mut sessions = self.sessions.write().unwrap();
        let data = sessions.entry(session_id.to_string()).or_insert_with(SessionData::new);
        data.last_touched_at = turn.timestamp;
        data.history.push(turn);
    }

    /// Ordered copy of the session's history; empty for unknown sessions.
    pub fn snapshot(&self, session_id: &str) -> Vec<ChatTurn> {
        self.sessions
            .read()
            .unwrap()
            .get(session_id)
            .map(|data| data.history.clone())
            .unwrap_or_default()
    }

    pub fn set_metadata(&self, session_id: &str, key: impl Into<String>, value: Value) {
        let mut sessions = self.sessions.write().unwrap();
        let data = sessions.entry(session_id.to_string()).or_insert_with(SessionData::new);
        data.metadata.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The per-session turn gate: holding it for the duration of a turn
    /// serializes turns within a session while leaving distinct sessions
    /// fully independent.
    pub fn turn_gate(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn view(session_id: &str, data: &SessionData) -> SessionView {
    SessionView {
        session_id: session_id.to_string(),
        history: data.history.clone(),
        created_at: data.created_at,
        last_touched_at: data.last_touched_at,
        metadata: data.metadata.clone(),
    }
}

fn evict_oldest(sessions: &mut HashMap<String, SessionData>) {
    if let Some(oldest) = sessions
        .iter()
        .min_by_key(|(_, data)| data.last_touched_at)
        .map(|(id, _)| id.clone())
    {
        sessions.remove(&oldest);
    }
}
