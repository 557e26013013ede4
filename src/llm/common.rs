//! Common utilities for OpenAI-compatible providers
//!
//! Helpers for building request messages, classifying client errors and
//! extracting the answer text.

use super::{LlmError, Message};
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionResponse,
};

/// Build a list of chat messages for OpenAI-compatible APIs
///
/// # Errors
///
/// Returns `LlmError::Unknown` if message building fails.
pub fn build_openai_messages(
    system_prompt: &str,
    history: &[Message],
    user_message: &str,
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let mut messages = vec![ChatCompletionRequestSystemMessageArgs::default()
        .content(system_prompt)
        .build()
        .map_err(|e| LlmError::Unknown(e.to_string()))?
        .into()];

    for msg in history {
        let m = match msg.role.as_str() {
            "user" => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .map_err(|e| LlmError::Unknown(e.to_string()))?
                .into(),
            _ => ChatCompletionRequestAssistantMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .map_err(|e| LlmError::Unknown(e.to_string()))?
                .into(),
        };
        messages.push(m);
    }

    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into(),
    );

    Ok(messages)
}

/// Extract text content from an OpenAI-compatible chat completion response
///
/// # Errors
///
/// Returns `LlmError::ApiError` if the response is empty.
pub fn extract_openai_response(
    response: &CreateChatCompletionResponse,
) -> Result<String, LlmError> {
    response
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))
}

/// Map a client error onto the provider error taxonomy
pub fn classify_openai_error(err: &OpenAIError) -> LlmError {
    classify_error_message(err.to_string())
}

fn classify_error_message(message: String) -> LlmError {
    let lowered = message.to_lowercase();
    if lowered.contains("rate limit") || lowered.contains("429") {
        LlmError::RateLimit {
            wait_secs: None,
            message,
        }
    } else if lowered.starts_with("http error") || lowered.contains("timed out") {
        LlmError::NetworkError(message)
    } else if lowered.contains("json") || lowered.contains("deserialize") {
        LlmError::JsonError(message)
    } else {
        LlmError::ApiError(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limits_as_transient() {
        let err = classify_error_message("Rate limit reached for gpt-4o-mini".to_string());
        assert!(matches!(err, LlmError::RateLimit { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn classifies_transport_failures_as_network() {
        let err = classify_error_message("http error: connection reset".to_string());
        assert!(matches!(err, LlmError::NetworkError(_)));
    }

    #[test]
    fn classifies_everything_else_as_api_error() {
        let err = classify_error_message("invalid_request_error: model not found".to_string());
        assert!(matches!(err, LlmError::ApiError(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn builds_system_history_and_user_messages() -> Result<(), LlmError> {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let messages = build_openai_messages("system", &history, "where is my order?")?;
        assert_eq!(messages.len(), 4);
        Ok(())
    }
}
