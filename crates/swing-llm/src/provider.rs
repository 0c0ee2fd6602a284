//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A chat-completion backend.
///
/// The trading core holds an `Arc<dyn LLMProvider>` and never names a concrete
/// backend, so hosted, local and test providers are interchangeable.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short backend name used in logs and error messages
    fn name(&self) -> &str;
}
