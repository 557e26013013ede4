#![warn(missing_docs)]
//! Support Router library.
//!
//! Response-routing and type-dispatch for a hybrid support agent: a routing
//! policy either answers directly or names one registered capability handler,
//! the router invokes it, validates its output against the declared response
//! kind and normalizes everything into a single response envelope.

/// Configuration management.
pub mod config;
/// LLM providers and LLM-backed sub-agents.
pub mod llm;
/// Delegation router, handler registry and routing policies.
pub mod router;
/// Customer-support capability catalog.
pub mod support;
/// Utility functions.
pub mod utils;
