pub mod client;
pub mod types;

pub use client::{McpClient, MCP_PROTOCOL_VERSION};
pub use types::ToolDescriptor;
