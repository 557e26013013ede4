//! Immutable handler registry
//!
//! Built once at startup through [`RegistryBuilder`] and shared read-only
//! behind an `Arc`. Building checks the registration invariants so the router
//! never has to.

use super::handler::{CapabilityHandler, ResponseKind};
use super::policy::CatalogEntry;
use super::schema::OutputSchema;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Registration invariant violated at build time
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Handler name is blank
    #[error("handler name must not be empty")]
    EmptyName,
    /// Two handlers share a name
    #[error("handler '{0}' is registered more than once")]
    DuplicateName(String),
    /// STRUCTURED handler without an output schema
    #[error("structured handler '{0}' does not declare an output schema")]
    MissingSchema(String),
    /// Output schema on a DIRECT or TEXT handler
    #[error("handler '{name}' declares an output schema but its kind is {kind}")]
    UnexpectedSchema {
        /// Handler name
        name: String,
        /// Declared kind
        kind: ResponseKind,
    },
    /// Output schema is itself inconsistent
    #[error("handler '{name}' has an invalid output schema: {reason}")]
    InvalidSchema {
        /// Handler name
        name: String,
        /// What is wrong with it
        reason: String,
    },
    /// Per-handler timeout of zero
    #[error("handler '{0}' has a zero timeout")]
    ZeroTimeout(String),
}

/// A handler together with its registration settings
#[derive(Clone)]
pub struct RegisteredHandler {
    handler: Arc<dyn CapabilityHandler>,
    timeout: Option<Duration>,
}

impl RegisteredHandler {
    /// Handler name
    #[must_use]
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// Declared kind
    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        self.handler.kind()
    }

    /// Output schema (present iff the kind is STRUCTURED)
    #[must_use]
    pub fn schema(&self) -> Option<&OutputSchema> {
        self.handler.output_schema()
    }

    /// Timeout set at registration, if any
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The handler itself
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn CapabilityHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Read-only set of capability handlers, in registration order
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<RegisteredHandler>,
    index: HashMap<String, usize>,
}

impl HandlerRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a handler by exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredHandler> {
        self.index.get(name).and_then(|&i| self.handlers.get(i))
    }

    /// Catalog shown to routing policies
    #[must_use]
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.handlers
            .iter()
            .map(|entry| CatalogEntry {
                name: entry.name().to_string(),
                kind: entry.kind(),
                description: entry.handler.description().to_string(),
            })
            .collect()
    }

    /// Handler names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(RegisteredHandler::name)
    }

    /// Number of handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Collects handlers and validates them on [`RegistryBuilder::build`]
#[derive(Default)]
pub struct RegistryBuilder {
    pending: Vec<RegisteredHandler>,
}

impl RegistryBuilder {
    /// Register a handler using the router's default timeout
    #[must_use]
    pub fn register<H>(self, handler: H) -> Self
    where
        H: CapabilityHandler + 'static,
    {
        self.register_shared(Arc::new(handler), None)
    }

    /// Register a handler with its own timeout
    #[must_use]
    pub fn register_with_timeout<H>(self, handler: H, timeout: Duration) -> Self
    where
        H: CapabilityHandler + 'static,
    {
        self.register_shared(Arc::new(handler), Some(timeout))
    }

    /// Register an already shared handler
    #[must_use]
    pub fn register_shared(
        mut self,
        handler: Arc<dyn CapabilityHandler>,
        timeout: Option<Duration>,
    ) -> Self {
        self.pending.push(RegisteredHandler { handler, timeout });
        self
    }

    /// Validate every registration and freeze the registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] found, in registration order.
    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        let mut index = HashMap::with_capacity(self.pending.len());
        for (i, entry) in self.pending.iter().enumerate() {
            let name = entry.name();
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if index.insert(name.to_string(), i).is_some() {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
            if entry.timeout.is_some_and(|t| t.is_zero()) {
                return Err(RegistryError::ZeroTimeout(name.to_string()));
            }
            match (entry.kind(), entry.schema()) {
                (ResponseKind::Structured, None) => {
                    return Err(RegistryError::MissingSchema(name.to_string()));
                }
                (ResponseKind::Structured, Some(schema)) => {
                    schema
                        .check()
                        .map_err(|reason| RegistryError::InvalidSchema {
                            name: name.to_string(),
                            reason,
                        })?;
                }
                (kind, Some(_)) => {
                    return Err(RegistryError::UnexpectedSchema {
                        name: name.to_string(),
                        kind,
                    });
                }
                (_, None) => {}
            }
            debug!(handler = name, kind = %entry.kind(), "Registered capability handler");
        }
        Ok(HandlerRegistry {
            handlers: self.pending,
            index,
        })
    }
}
