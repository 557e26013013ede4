//! Routing error taxonomy
//!
//! Every variant is caught at the `route` boundary and turned into the
//! fallback envelope; `try_route` exposes them to internal callers.

use super::policy::PolicyError;
use super::schema::SchemaValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Stable label of a routing failure, used in logs, events and envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Policy named a handler that is not registered
    UnknownHandler,
    /// Structured output violated its schema
    SchemaValidation,
    /// Handler exceeded its time budget
    HandlerTimeout,
    /// Handler failed or produced unusable output
    HandlerInvocation,
    /// Routing policy failed
    Policy,
    /// Request cancelled by the caller
    Cancelled,
    /// Query was empty
    InvalidQuery,
}

impl ErrorKind {
    /// Label as logged
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownHandler => "unknown_handler",
            Self::SchemaValidation => "schema_validation",
            Self::HandlerTimeout => "handler_timeout",
            Self::HandlerInvocation => "handler_invocation",
            Self::Policy => "policy",
            Self::Cancelled => "cancelled",
            Self::InvalidQuery => "invalid_query",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single routing call
#[derive(Debug, Error)]
pub enum RouteError {
    /// Routing policy selected a handler that is not in the registry
    #[error("unknown handler '{name}'")]
    UnknownHandler {
        /// Name returned by the policy
        name: String,
    },
    /// Structured handler violated its output contract
    #[error("handler '{handler}' returned an invalid result: {source}")]
    SchemaValidation {
        /// Handler name
        handler: String,
        /// Every violation found
        #[source]
        source: SchemaValidationError,
    },
    /// Handler did not finish within its time budget
    #[error("handler '{handler}' timed out after {}ms", .timeout.as_millis())]
    HandlerTimeout {
        /// Handler name
        handler: String,
        /// Budget that was exceeded
        timeout: Duration,
    },
    /// Handler returned an error or unusable output
    #[error("handler '{handler}' failed: {message}")]
    HandlerInvocation {
        /// Handler name
        handler: String,
        /// Failure description
        message: String,
    },
    /// Routing policy could not produce a decision
    #[error("routing policy failed: {0}")]
    Policy(#[from] PolicyError),
    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled {
        /// Handler in flight when the request was cancelled
        handler: Option<String>,
    },
    /// Query was empty after trimming
    #[error("query must not be empty")]
    InvalidQuery,
}

impl RouteError {
    /// Stable label of this failure
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownHandler { .. } => ErrorKind::UnknownHandler,
            Self::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            Self::HandlerTimeout { .. } => ErrorKind::HandlerTimeout,
            Self::HandlerInvocation { .. } => ErrorKind::HandlerInvocation,
            Self::Policy(_) => ErrorKind::Policy,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidQuery => ErrorKind::InvalidQuery,
        }
    }

    /// Handler involved in the failure, if one was selected
    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        match self {
            Self::UnknownHandler { name } => Some(name),
            Self::SchemaValidation { handler, .. }
            | Self::HandlerTimeout { handler, .. }
            | Self::HandlerInvocation { handler, .. } => Some(handler),
            Self::Cancelled { handler } => handler.as_deref(),
            Self::Policy(_) | Self::InvalidQuery => None,
        }
    }
}
