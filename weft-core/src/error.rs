#[derive(Debug, thiserror::Error)]
pub enum WeftError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String, data: Option<serde_json::Value> },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("model error: {0}")]
    Llm(String),

    #[error("deadline elapsed: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected: {0}")]
    Reject(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl WeftError {
    /// Short stable name of the error kind, recorded on failed tasks.
    pub fn kind(&self) -> &'static str {
        match self {
            WeftError::Transport(_) => "transport",
            WeftError::Remote { .. } => "remote",
            WeftError::Protocol(_) => "protocol",
            WeftError::UnknownCapability(_) => "unknown_capability",
            WeftError::Llm(_) => "llm",
            WeftError::Timeout(_) => "timeout",
            WeftError::Cancelled => "cancelled",
            WeftError::CapacityExceeded(_) => "capacity_exceeded",
            WeftError::NotFound(_) => "not_found",
            WeftError::Reject(_) => "reject",
            WeftError::Config(_) => "config",
            WeftError::Io(_) => "io",
            WeftError::Serde(_) => "serde",
        }
    }

    /// Whether a capability call failing with this error still lets the turn
    /// continue (the result is reified into the conversation) or aborts it.
    pub fn is_fatal_to_turn(&self) -> bool {
        matches!(
            self,
            WeftError::Llm(_)
                | WeftError::Timeout(_)
                | WeftError::Cancelled
                | WeftError::CapacityExceeded(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WeftError>;
