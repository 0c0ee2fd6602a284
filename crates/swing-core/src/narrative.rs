//! One-sentence trade thesis generation

use crate::config::NarrativeConfig;
use crate::error::{Result, TraderError};
use crate::reports::{Action, Bias, Valuation};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use swing_llm::{CompletionRequest, LLMProvider, Message};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are the head trader of an Indian equities swing desk. \
Write exactly one sentence (at most 40 words) justifying the decision in the JSON you are given. \
Use only the facts provided; do not invent numbers.";

/// Facts the thesis may draw on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeContext {
    pub ticker: String,
    pub action: Action,
    pub technical_bias: Bias,
    pub fundamental_bias: Bias,
    pub strength_score: u8,
    pub daily_trend: String,
    pub weekly_trend: String,
    pub catalysts: Vec<String>,
    pub valuation: Valuation,
    pub entry: f64,
    pub stop_loss: f64,
    pub target1: f64,
    pub reward_to_risk: f64,
    /// Why the desk is standing aside, for WAIT decisions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_reason: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, context: &NarrativeContext) -> Result<String>;
}

/// Deterministic thesis assembled from the context
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn render(context: &NarrativeContext) -> String {
        let ticker = &context.ticker;
        if context.action == Action::Wait {
            let reason = context
                .wait_reason
                .as_deref()
                .unwrap_or("no actionable setup");
            return format!("{ticker}: standing aside, {reason}.");
        }

        let verb = if context.action == Action::Buy { "buy" } else { "sell" };
        let catalyst = context
            .catalysts
            .first()
            .map(|c| format!(", backed by \"{c}\""))
            .unwrap_or_default();

        format!(
            "{ticker}: {} daily and {} weekly trend with strength {}/10{catalyst}; {verb} near {:.2} with stop {:.2} and first target {:.2} (reward-to-risk {:.1}).",
            context.daily_trend,
            context.weekly_trend,
            context.strength_score,
            context.entry,
            context.stop_loss,
            context.target1,
            context.reward_to_risk,
        )
    }
}

#[async_trait]
impl Narrator for TemplateNarrator {
    async fn narrate(&self, context: &NarrativeContext) -> Result<String> {
        Ok(Self::render(context))
    }
}

/// Thesis written by a chat-completion model
pub struct LlmNarrator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: f32,
    retry: RetryPolicy,
}

impl LlmNarrator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &NarrativeConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: RetryPolicy::no_retry(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn narrate(&self, context: &NarrativeContext) -> Result<String> {
        let facts = serde_json::to_string(context)?;

        let response = self
            .retry
            .execute("thesis completion", || {
                let request = CompletionRequest::new(&self.model)
                    .with_system(SYSTEM_PROMPT)
                    .with_message(Message::user(facts.clone()))
                    .with_max_tokens(self.max_tokens)
                    .with_temperature(self.temperature);
                self.provider.complete(request)
            })
            .await?;

        debug!(
            provider = self.provider.name(),
            tokens = response.usage.total(),
            truncated = response.is_truncated(),
            "Thesis generated"
        );

        let text = response
            .text()
            .ok_or_else(|| TraderError::Upstream("model returned an empty thesis".to_string()))?;
        Ok(text.lines().next().unwrap_or(text).trim().to_string())
    }
}
