//! Completion request and response types

use crate::Message;
use serde::{Deserialize, Serialize};

/// One chat completion call.
///
/// Narrative requests are short and single-turn: a system prompt, one user
/// message carrying the facts, and a small token budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: Vec::new(),
            max_tokens: 128,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sampling temperature; `0.0` keeps theses close to deterministic
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Why generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Finished,
    /// Cut off by `max_tokens`
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Generated text, `None` when the model answered with nothing but whitespace
    pub fn text(&self) -> Option<&str> {
        self.message.text()
    }

    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::Truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_chain() {
        let request = CompletionRequest::new("gpt-4o-mini")
            .with_system("You are a head trader")
            .with_message(Message::user(r#"{"ticker":"TATAMOTORS.NS"}"#))
            .with_max_tokens(80)
            .with_temperature(0.0);

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.system.as_deref(), Some("You are a head trader"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, 80);
        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn test_unset_fields_not_serialized() {
        let json = serde_json::to_value(CompletionRequest::new("local")).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 128);
    }

    #[test]
    fn test_response_text() {
        let response = CompletionResponse {
            message: Message::assistant("  Breakout on volume.  "),
            stop_reason: StopReason::Truncated,
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
            },
        };
        assert_eq!(response.text(), Some("Breakout on volume."));
        assert!(response.is_truncated());
        assert_eq!(response.usage.total(), 150);
    }
}
