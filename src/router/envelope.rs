//! Response envelope
//!
//! The single normalized output of one routing call. `presented_text` is
//! always populated and `payload` is present exactly when the kind is not
//! `DIRECT`; the constructors are crate-private so both hold by construction.

use super::error::ErrorKind;
use super::handler::ResponseKind;
use super::schema::StructuredResult;
use serde::Serialize;
use uuid::Uuid;

/// `source_handler` of policy-level direct answers and fallbacks
pub const DIRECT_SOURCE: &str = "none";

/// Validated handler payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Schema-validated fields
    Structured(StructuredResult),
    /// Relayed text
    Text(String),
}

impl Payload {
    /// Structured fields, if any
    #[must_use]
    pub const fn as_structured(&self) -> Option<&StructuredResult> {
        match self {
            Self::Structured(result) => Some(result),
            Self::Text(_) => None,
        }
    }

    /// Text payload, if any
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Structured(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// Normalized result of one `route` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    request_id: Uuid,
    source_handler: String,
    kind: ResponseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Payload>,
    presented_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<ErrorKind>,
}

impl ResponseEnvelope {
    /// Direct answer from the routing policy
    pub(crate) fn direct(request_id: Uuid, text: String) -> Self {
        Self::from_direct_handler(request_id, DIRECT_SOURCE.to_string(), text)
    }

    /// Direct answer produced by a handler registered as `DIRECT`
    pub(crate) fn from_direct_handler(
        request_id: Uuid,
        handler: String,
        text: String,
    ) -> Self {
        Self {
            request_id,
            source_handler: handler,
            kind: ResponseKind::Direct,
            payload: None,
            presented_text: text,
            failure: None,
        }
    }

    /// Validated structured result with its rendering
    pub(crate) fn structured(
        request_id: Uuid,
        handler: String,
        result: StructuredResult,
        presented_text: String,
    ) -> Self {
        Self {
            request_id,
            source_handler: handler,
            kind: ResponseKind::Structured,
            payload: Some(Payload::Structured(result)),
            presented_text,
            failure: None,
        }
    }

    /// Relayed text result with its rendering
    pub(crate) fn text(
        request_id: Uuid,
        handler: String,
        text: String,
        presented_text: String,
    ) -> Self {
        Self {
            request_id,
            source_handler: handler,
            kind: ResponseKind::Text,
            payload: Some(Payload::Text(text)),
            presented_text,
            failure: None,
        }
    }

    /// Apology envelope masking a routing failure
    pub(crate) fn fallback(request_id: Uuid, message: String, failure: ErrorKind) -> Self {
        Self {
            failure: Some(failure),
            ..Self::direct(request_id, message)
        }
    }

    /// Request identifier shared with the observability event
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Name of the handler that produced the answer, or `"none"`
    #[must_use]
    pub fn source_handler(&self) -> &str {
        &self.source_handler
    }

    /// Response kind
    #[must_use]
    pub const fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Validated payload; `None` for `DIRECT`
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Text shown to the end user
    #[must_use]
    pub fn presented_text(&self) -> &str {
        &self.presented_text
    }

    /// Failure masked by this envelope, if it is a fallback
    #[must_use]
    pub const fn failure(&self) -> Option<ErrorKind> {
        self.failure
    }

    /// Whether this envelope is a fallback apology
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}
