//! LLM providers
//!
//! Provides the inference interface used by the LLM routing policy and by
//! LLM-backed sub-agents, plus an OpenAI-compatible implementation.

mod common;
mod openai_compat;
/// Capability handler backed by an LLM sub-agent
pub mod sub_agent;

pub use openai_compat::OpenAiCompatProvider;
pub use sub_agent::LlmSubAgentHandler;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Rate limit exceeded (429), optionally with a wait time
    #[error("Rate limit exceeded: {message} (wait: {wait_secs:?}s)")]
    RateLimit {
        /// Retry-After duration in seconds, if provided by the server
        wait_secs: Option<u64>,
        /// Error message from the server
        message: String,
    },
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl LlmError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::RateLimit { .. })
    }
}

/// A message in an LLM conversation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender (user, assistant)
    pub role: String,
    /// Text content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    /// Create a new assistant message
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

/// Interface for all LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a chat completion
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}
