use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One entry of the append-only capability audit log.
///
/// `capability_summary` snapshots the function names exposed at the moment of
/// a successful add; removes carry an empty summary. Sessions survive every
/// topology change, so `session_preserved` is recorded as `true` throughout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub session_preserved: bool,
    #[serde(default)]
    pub capability_summary: Vec<FunctionSummary>,
}

impl HistoryEntry {
    pub fn added(url: impl Into<String>, capability_summary: Vec<FunctionSummary>) -> Self {
        Self {
            action: HistoryAction::Add,
            url: url.into(),
            timestamp: Utc::now(),
            session_preserved: true,
            capability_summary,
        }
    }

    pub fn removed(url: impl Into<String>) -> Self {
        Self {
            action: HistoryAction::Remove,
            url: url.into(),
            timestamp: Utc::now(),
            session_preserved: true,
            capability_summary: Vec::new(),
        }
    }
}
