//! OpenAI provider implementation
//!
//! Implements [`LLMProvider`] on top of the chat completions endpoint. Any
//! OpenAI-compatible server works (llama.cpp, vLLM, LM Studio, Azure) by
//! pointing `api_base` at it.
//!
//! ```no_run
//! use swing_llm::{CompletionRequest, LLMProvider, Message};
//! use swing_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn example() -> swing_llm::Result<()> {
//! let provider = OpenAIProvider::with_config(
//!     OpenAIConfig::new("not-needed").with_api_base("http://localhost:1234/v1"),
//! )?;
//!
//! let request = CompletionRequest::new("gpt-4o-mini")
//!     .with_message(Message::user("One sentence on TATAMOTORS.NS"))
//!     .with_max_tokens(80);
//!
//! let response = provider.complete(request).await?;
//! println!("{}", response.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use crate::{CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, StopReason, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Without trailing slash
    pub api_base: String,
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Reads `OPENAI_API_KEY` (required) and `OPENAI_API_BASE` (optional).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LLMError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let config = Self::new(api_key);
        Ok(match std::env::var("OPENAI_API_BASE") {
            Ok(base) if !base.trim().is_empty() => config.with_api_base(base),
            _ => config,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

/// OpenAI chat completions provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip_all, fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model: &request.model,
            messages: chat_messages(request.system.as_deref(), &request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(self.name(), status.as_u16(), text));
        }

        let chat: ChatResponse = response.json().await?;
        into_completion(chat)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// The system prompt leads the message list
fn chat_messages<'a>(system: Option<&'a str>, messages: &'a [Message]) -> Vec<ChatMessage<'a>> {
    system
        .map(|content| ChatMessage { role: "system", content })
        .into_iter()
        .chain(messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }))
        .collect()
}

fn into_completion(chat: ChatResponse) -> Result<CompletionResponse> {
    let choice = chat
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::Malformed("response carried no choices".to_string()))?;

    let usage = chat.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    });
    let stop_reason = match choice.finish_reason.as_deref() {
        Some("length") => StopReason::Truncated,
        _ => StopReason::Finished,
    };
    debug!(?stop_reason, tokens = usage.total(), "Completion received");

    Ok(CompletionResponse {
        message: Message::assistant(choice.message.content.unwrap_or_default()),
        stop_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn test_config_chain() {
        let config = OpenAIConfig::new("sk-test")
            .with_api_base(" http://localhost:1234/v1/ ")
            .with_timeout(30);

        assert_eq!(config.api_base, "http://localhost:1234/v1");
        assert_eq!(config.endpoint(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_system_prompt_leads() {
        let messages = vec![Message::user("Assess INFY.NS")];
        let chat = chat_messages(Some("You are a risk desk"), &messages);

        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0].role, "system");
        assert_eq!(chat[1].role, "user");
        assert_eq!(chat[1].content, "Assess INFY.NS");
        assert_eq!(chat_messages(None, &messages).len(), 1);
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "Breakout above resistance on rising volume."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 12}
        }"#;

        let completion = into_completion(serde_json::from_str(raw).unwrap()).unwrap();
        assert_eq!(completion.message.role, Role::Assistant);
        assert_eq!(completion.text(), Some("Breakout above resistance on rising volume."));
        assert_eq!(completion.stop_reason, StopReason::Finished);
        assert_eq!(completion.usage.total(), 132);
    }

    #[test]
    fn test_length_is_truncated() {
        let raw = r#"{"choices": [{"message": {"content": "Breakout"}, "finish_reason": "length"}]}"#;
        let completion = into_completion(serde_json::from_str(raw).unwrap()).unwrap();
        assert!(completion.is_truncated());
        assert_eq!(completion.usage, TokenUsage::default());
    }

    #[test]
    fn test_no_choices_is_malformed() {
        let chat: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(into_completion(chat), Err(LLMError::Malformed(_))));
    }
}
