pub mod config;
pub mod error;
pub mod model;
pub mod rpc;
pub mod types;

pub use config::{sanitize_identifier, AgentConfig};
pub use error::{Result, WeftError};
pub use model::{FunctionDeclaration, Llm, LlmRequest, LlmResponse};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use types::{Content, FunctionResponseData, Part};
