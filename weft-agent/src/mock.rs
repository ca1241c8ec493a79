use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use weft_core::{Content, Llm, LlmRequest, LlmResponse, Part, Result, WeftError};

/// Scripted model adapter: replays queued responses in order. The script
/// running dry is a model error, which keeps tests honest about how many
/// round-trips a turn makes.
pub struct MockLlm {
    name: String,
    script: Mutex<VecDeque<LlmResponse>>,
}

impl MockLlm {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), script: Mutex::new(VecDeque::new()) }
    }

    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.with_response(LlmResponse::from_text(text))
    }

    pub fn with_call(self, function: impl Into<String>, args: serde_json::Value) -> Self {
        self.with_response(LlmResponse {
            content: Content::new("model").with_part(Part::function_call(function, args)),
        })
    }

    pub fn with_response(self, response: LlmResponse) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _req: LlmRequest) -> Result<LlmResponse> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| WeftError::Llm("mock script exhausted".to_string()))
    }
}

/// Deterministic fallback adapter that answers without a model provider:
/// it restates the latest user message. Lets an agent process come up and
/// exercise the full surface before a real provider is wired in.
pub struct EchoLlm;

#[async_trait]
impl Llm for EchoLlm {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, req: LlmRequest) -> Result<LlmResponse> {
        let last_user = req
            .contents
            .iter()
            .rev()
            .find(|c| c.role == "user")
            .map(|c| c.text())
            .unwrap_or_default();
        Ok(LlmResponse::from_text(format!("You said: {}", last_user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_in_order() {
        let mock = MockLlm::new("test")
            .with_call("echo", serde_json::json!({"text": "x"}))
            .with_reply("done");

        let req = LlmRequest {
            model: "test".into(),
            system_instruction: String::new(),
            contents: vec![],
            functions: vec![],
        };

        let first = mock.generate(req.clone()).await.unwrap();
        assert_eq!(first.function_calls().len(), 1);

        let second = mock.generate(req.clone()).await.unwrap();
        assert_eq!(second.final_text(), "done");

        let err = mock.generate(req).await.unwrap_err();
        assert!(matches!(err, WeftError::Llm(_)));
    }

    #[tokio::test]
    async fn test_echo_restates_last_user_message() {
        let req = LlmRequest {
            model: "echo".into(),
            system_instruction: String::new(),
            contents: vec![
                Content::new("user").with_text("first"),
                Content::new("model").with_text("ok"),
                Content::new("user").with_text("second"),
            ],
            functions: vec![],
        };
        let response = EchoLlm.generate(req).await.unwrap();
        assert_eq!(response.final_text(), "You said: second");
    }
}
