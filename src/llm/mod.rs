//! LLM provider abstraction layer.
//!
//! The constraint extraction and validation passes talk to a text-generation
//! backend through the [`LlmProvider`] trait, so the pipeline never depends
//! on a concrete vendor API.

mod openai;
mod provider;
mod types;

pub use openai::OpenAiProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
