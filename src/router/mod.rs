//! Delegation router
//!
//! Handler contract, immutable registry, routing policies, output schemas,
//! presentation and the router itself.

mod dispatcher;
mod envelope;
mod error;
mod events;
mod handler;
mod presenter;
mod registry;
mod stage;

/// Routing policy implementations
pub mod policies;
/// Routing policy contract
pub mod policy;
/// Prompt composition for LLM-backed routing and sub-agents
pub mod prompt;
/// Output schemas and validation
pub mod schema;

pub use dispatcher::{DelegationRouter, RouterConfig};
pub use envelope::{Payload, ResponseEnvelope, DIRECT_SOURCE};
pub use error::{ErrorKind, RouteError};
pub use events::{
    ChannelSink, FanoutSink, MemorySink, ObservabilitySink, Outcome, RouteEvent, SinkError,
    TracingSink,
};
pub use handler::{
    CapabilityHandler, FnHandler, HandlerError, HandlerOutput, QueryContext, ResponseKind,
};
pub use policies::{KeywordPolicy, LlmRoutingPolicy};
pub use policy::{CatalogEntry, PolicyDecision, PolicyError, RoutingPolicy};
pub use presenter::Presenter;
pub use registry::{HandlerRegistry, RegisteredHandler, RegistryBuilder, RegistryError};
pub use schema::{
    FieldSpec, FieldType, OutputSchema, Requirement, SchemaValidationError, StructuredResult,
    Violation,
};
pub use stage::{RouteProgress, RouteStage};
