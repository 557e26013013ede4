//! OpenAI-compatible provider
//!
//! Chat completions through the async-openai client against any endpoint that
//! speaks the OpenAI chat API. Transient failures are retried with jittered
//! exponential backoff.

use super::common::{build_openai_messages, classify_openai_error, extract_openai_response};
use super::{LlmError, LlmProvider, Message};
use crate::config::{LLM_INITIAL_BACKOFF_MS, LLM_MAX_BACKOFF_MS, LLM_MAX_RETRIES};
use async_openai::{config::OpenAIConfig, types::chat::CreateChatCompletionRequestArgs, Client};
use async_trait::async_trait;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// LLM provider for OpenAI-compatible chat endpoints
pub struct OpenAiCompatProvider {
    client: Client<OpenAIConfig>,
    temperature: f32,
}

impl OpenAiCompatProvider {
    /// Create a new provider for the given key and API base
    #[must_use]
    pub fn new(api_key: String, api_base: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            temperature: crate::config::SUB_AGENT_TEMPERATURE,
        }
    }

    /// Override the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn complete_once(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let messages = build_openai_messages(system_prompt, history, user_message)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model_id)
            .messages(messages)
            .max_tokens(max_tokens)
            .temperature(self.temperature)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_openai_error(&e))?;

        extract_openai_response(&response)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let retry_strategy = ExponentialBackoff::from_millis(LLM_INITIAL_BACKOFF_MS)
            .max_delay(Duration::from_millis(LLM_MAX_BACKOFF_MS))
            .map(jitter) // Add jitter to prevent thundering herd
            .take(LLM_MAX_RETRIES);

        RetryIf::spawn(
            retry_strategy,
            move || async move {
                debug!(model = model_id, "Sending chat completion request");
                self.complete_once(system_prompt, history, user_message, model_id, max_tokens)
                    .await
            },
            |err: &LlmError| {
                let transient = err.is_transient();
                if transient {
                    warn!(model = model_id, error = %err, "Transient inference failure, retrying");
                }
                transient
            },
        )
        .await
    }
}
