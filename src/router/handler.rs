//! Capability handler trait
//!
//! A capability handler is one unit of delegated work with a fixed response
//! kind. Implementations include the support sub-agents and
//! `LlmSubAgentHandler`.

use super::schema::OutputSchema;
use crate::llm::{LlmError, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Declared response kind of a handler (and of an envelope)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    /// Answer produced without structured payload
    Direct,
    /// Schema-bound field mapping
    Structured,
    /// Free text relayed verbatim
    Text,
}

impl ResponseKind {
    /// Stable label used in logs and prompts
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Structured => "STRUCTURED",
            Self::Text => "TEXT",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied per-request state
///
/// Opaque to the router; handlers and policies may read the session id,
/// attributes and earlier conversation turns. The cancellation token aborts
/// only the request it belongs to.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    session_id: Option<String>,
    attributes: BTreeMap<String, String>,
    history: Vec<Message>,
    cancellation: CancellationToken,
}

impl QueryContext {
    /// Empty context with a fresh cancellation token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session identifier
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a string attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attach earlier turns of the conversation, oldest first
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Session identifier, if any
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Look up an attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// All attributes in key order
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Earlier turns of the conversation
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Cancellation token for this request
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Raw result of a handler invocation, before validation
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// Already-parsed JSON value
    Structured(serde_json::Value),
    /// Text; for structured handlers it is parsed as JSON by the router
    Text(String),
}

impl HandlerOutput {
    /// Convenience constructor for text output
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Errors a handler may report
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Work failed for a handler-specific reason
    #[error("{0}")]
    Failed(String),
    /// Inference call failed
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// Result could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Unified interface for capability handlers
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Unique handler name the routing policy refers to
    fn name(&self) -> &str;

    /// Declared response kind
    fn kind(&self) -> ResponseKind;

    /// One-line description shown to the routing policy
    fn description(&self) -> &str {
        ""
    }

    /// Output schema; required for and only allowed on `STRUCTURED` handlers
    fn output_schema(&self) -> Option<&OutputSchema> {
        None
    }

    /// Perform the delegated work
    async fn invoke(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> Result<HandlerOutput, HandlerError>;
}

/// Handler built from an async closure
///
/// # Examples
///
/// ```
/// use support_router::router::{FnHandler, HandlerOutput, ResponseKind};
///
/// let echo = FnHandler::new("echo", ResponseKind::Text, |query, _ctx| async move {
///     Ok(HandlerOutput::Text(query))
/// })
/// .with_description("Repeats the question");
/// # let _ = echo;
/// ```
pub struct FnHandler<F> {
    name: String,
    kind: ResponseKind,
    description: String,
    schema: Option<OutputSchema>,
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(String, QueryContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HandlerOutput, HandlerError>> + Send,
{
    /// Create a handler from a closure
    pub fn new(name: impl Into<String>, kind: ResponseKind, func: F) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            schema: None,
            func,
        }
    }

    /// Set the catalog description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare the output schema
    #[must_use]
    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(String, QueryContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HandlerOutput, HandlerError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResponseKind {
        self.kind
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_schema(&self) -> Option<&OutputSchema> {
        self.schema.as_ref()
    }

    async fn invoke(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> Result<HandlerOutput, HandlerError> {
        (self.func)(query.to_string(), context.clone()).await
    }
}
