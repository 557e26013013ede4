//! Routing policy contract
//!
//! A policy sees the query, the caller context and the handler catalog and
//! either answers directly or names exactly one handler. It performs no
//! validation of the name; the router does.

use super::handler::{QueryContext, ResponseKind};
use crate::llm::LlmError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a routing decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Answer produced by the policy itself
    Direct(String),
    /// Name of the handler to delegate to
    Delegate(String),
}

/// What a policy knows about a registered handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Handler name
    pub name: String,
    /// Declared response kind
    pub kind: ResponseKind,
    /// One-line description
    pub description: String,
}

/// Errors a routing policy may report
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Inference call failed
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// Decision could not be understood
    #[error("malformed routing decision: {0}")]
    Malformed(String),
    /// Decision took longer than the policy budget
    #[error("routing decision timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// Policy cannot decide right now
    #[error("routing policy unavailable: {0}")]
    Unavailable(String),
}

/// Decision procedure that selects a handler or answers directly
#[async_trait]
pub trait RoutingPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Decide how to serve `query`. `catalog` is in registration order.
    async fn decide(
        &self,
        query: &str,
        context: &QueryContext,
        catalog: &[CatalogEntry],
    ) -> Result<PolicyDecision, PolicyError>;
}
