use crate::{types::Content, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Contract between the turn executor and a concrete model provider.
///
/// The executor re-supplies the full context on every call; implementations
/// must not keep hidden conversational state. A response either carries a
/// final assistant text or one or more `FunctionCall` parts that the executor
/// dispatches before calling again.
#[async_trait]
pub trait Llm: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, req: LlmRequest) -> Result<LlmResponse>;
}

/// One callable function signature projected from the capability registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub system_instruction: String,
    pub contents: Vec<Content>,
    /// Declaration order is significant and must be preserved.
    pub functions: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: Content,
}

impl LlmResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { content: Content::new("model").with_text(text) }
    }

    /// All function calls requested by this response, in order.
    pub fn function_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.content
            .parts
            .iter()
            .filter_map(|p| match p {
                crate::Part::FunctionCall { name, args, .. } => {
                    Some((name.clone(), args.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn final_text(&self) -> String {
        self.content.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Part;

    #[test]
    fn test_response_from_text() {
        let resp = LlmResponse::from_text("hi");
        assert_eq!(resp.final_text(), "hi");
        assert!(resp.function_calls().is_empty());
    }

    #[test]
    fn test_function_calls_in_order() {
        let resp = LlmResponse {
            content: Content::new("model")
                .with_part(Part::function_call("a", serde_json::json!({})))
                .with_part(Part::function_call("b", serde_json::json!({}))),
        };
        let calls = resp.function_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "a");
        assert_eq!(calls[1].0, "b");
    }
}
