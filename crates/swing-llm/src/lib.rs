//! Text-generation abstraction layer for swing-rs
//!
//! The analysis core never talks to a model directly. Narrative fields (the
//! one-sentence trade thesis) are produced through the [`LLMProvider`] trait,
//! which this crate defines together with:
//!
//! - Plain-text message types
//! - Completion request/response types
//! - An OpenAI-compatible chat completions provider

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
