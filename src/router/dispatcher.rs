//! Delegation router
//!
//! Asks the routing policy for a decision, invokes the selected handler under
//! its timeout, validates the output against the handler's declared kind and
//! renders one response envelope. Every call emits exactly one observability
//! event; `route` additionally masks every failure with the fallback apology.

use super::envelope::{ResponseEnvelope, DIRECT_SOURCE};
use super::error::RouteError;
use super::events::{ObservabilitySink, Outcome, RouteEvent, TracingSink};
use super::handler::{HandlerOutput, QueryContext, ResponseKind};
use super::policy::{CatalogEntry, PolicyDecision, PolicyError, RoutingPolicy};
use super::presenter::Presenter;
use super::registry::{HandlerRegistry, RegisteredHandler};
use super::stage::{RouteProgress, RouteStage};
use crate::config::{
    Settings, DEFAULT_FALLBACK_MESSAGE, DEFAULT_HANDLER_TIMEOUT_MS, DEFAULT_POLICY_TIMEOUT_MS,
};
use crate::utils::query_hash;
use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Timeouts and fallback wording used by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Budget for a handler without a more specific timeout
    pub handler_timeout: Duration,
    /// Budget for the routing decision
    pub policy_timeout: Duration,
    /// Apology presented on any failure
    pub fallback_message: String,
    /// Per-handler budgets; take precedence over registration timeouts
    pub handler_timeouts: HashMap<String, Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_millis(DEFAULT_HANDLER_TIMEOUT_MS),
            policy_timeout: Duration::from_millis(DEFAULT_POLICY_TIMEOUT_MS),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            handler_timeouts: HashMap::new(),
        }
    }
}

impl RouterConfig {
    /// Router configuration from loaded settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            handler_timeout: settings.handler_timeout(),
            policy_timeout: settings.policy_timeout(),
            fallback_message: settings.fallback_message.clone(),
            handler_timeouts: settings.handler_timeout_overrides(),
        }
    }
}

/// Handler selected for the current request
struct Selection {
    name: String,
    kind: ResponseKind,
}

/// Routes queries to capability handlers
pub struct DelegationRouter {
    registry: Arc<HandlerRegistry>,
    catalog: Vec<CatalogEntry>,
    policy: Arc<dyn RoutingPolicy>,
    sink: Arc<dyn ObservabilitySink>,
    presenter: Presenter,
    config: RouterConfig,
}

impl DelegationRouter {
    /// Router with default configuration that logs events through `tracing`
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>, policy: Arc<dyn RoutingPolicy>) -> Self {
        let catalog = registry.catalog();
        Self {
            registry,
            catalog,
            policy,
            sink: Arc::new(TracingSink),
            presenter: Presenter::new(),
            config: RouterConfig::default(),
        }
    }

    /// Router configured from loaded settings
    #[must_use]
    pub fn from_settings(
        registry: Arc<HandlerRegistry>,
        policy: Arc<dyn RoutingPolicy>,
        settings: &Settings,
    ) -> Self {
        let mut presenter = Presenter::new().with_structured_heading(settings.structured_heading);
        if let Some(frame) = &settings.text_frame {
            presenter = presenter.with_text_frame(frame.clone());
        }
        Self::new(registry, policy)
            .with_config(RouterConfig::from_settings(settings))
            .with_presenter(presenter)
    }

    /// Replace the observability sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the presenter
    #[must_use]
    pub fn with_presenter(mut self, presenter: Presenter) -> Self {
        self.presenter = presenter;
        self
    }

    /// Replace timeouts and fallback wording
    #[must_use]
    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Handler registry
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Route one query. Always returns exactly one envelope; failures become
    /// the fallback apology with `kind = DIRECT`.
    pub async fn route(&self, query: &str, context: &QueryContext) -> ResponseEnvelope {
        let (request_id, result) = self.run(query, context).await;
        result.unwrap_or_else(|err| {
            ResponseEnvelope::fallback(request_id, self.config.fallback_message.clone(), err.kind())
        })
    }

    /// Route one query and return the raw error instead of the fallback.
    ///
    /// # Errors
    ///
    /// Returns the [`RouteError`] that `route` would have masked.
    pub async fn try_route(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> Result<ResponseEnvelope, RouteError> {
        self.run(query, context).await.1
    }

    async fn run(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> (Uuid, Result<ResponseEnvelope, RouteError>) {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let mut progress = RouteProgress::start(request_id);
        let mut selection = None;

        debug!(
            request_id = %request_id,
            query_hash = %query_hash(query),
            session_id = context.session_id().unwrap_or(DIRECT_SOURCE),
            "Routing query"
        );

        let result = self
            .execute(request_id, query, context, &mut progress, &mut selection)
            .await;

        if let Err(err) = &result {
            self.log_failure(request_id, query, err);
            progress.fail();
            progress.advance(RouteStage::Presenting);
        }
        progress.advance(RouteStage::Done);
        debug!(request_id = %request_id, trail = ?progress.trail(), "Route finished");

        let (handler_name, kind) = match (&selection, &result) {
            (Some(selected), _) => (selected.name.clone(), selected.kind),
            (None, Err(err)) => (
                err.handler().unwrap_or(DIRECT_SOURCE).to_string(),
                ResponseKind::Direct,
            ),
            (None, Ok(_)) => (DIRECT_SOURCE.to_string(), ResponseKind::Direct),
        };
        let event = RouteEvent {
            timestamp: Utc::now(),
            request_id,
            handler_name,
            kind,
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome: result
                .as_ref()
                .map_or_else(|err| Outcome::Failure(err.kind()), |_| Outcome::Success),
        };
        if let Err(e) = self.sink.record(&event) {
            debug!(request_id = %request_id, error = %e, "Observability sink rejected event");
        }

        (request_id, result)
    }

    async fn execute(
        &self,
        request_id: Uuid,
        query: &str,
        context: &QueryContext,
        progress: &mut RouteProgress,
        selection: &mut Option<Selection>,
    ) -> Result<ResponseEnvelope, RouteError> {
        if query.trim().is_empty() {
            return Err(RouteError::InvalidQuery);
        }

        let decision = self.decide(query, context).await?;
        progress.advance(RouteStage::PolicySelected);

        let name = match decision {
            PolicyDecision::Direct(text) => {
                if text.trim().is_empty() {
                    return Err(PolicyError::Malformed("empty direct answer".to_string()).into());
                }
                progress.advance(RouteStage::Direct);
                return Ok(ResponseEnvelope::direct(request_id, text));
            }
            PolicyDecision::Delegate(name) => name,
        };

        let entry = self
            .registry
            .get(&name)
            .ok_or(RouteError::UnknownHandler { name })?;
        *selection = Some(Selection {
            name: entry.name().to_string(),
            kind: entry.kind(),
        });

        progress.advance(RouteStage::Invoking);
        let output = self.invoke(entry, query, context).await?;

        progress.advance(RouteStage::Validating);
        self.validate_and_present(request_id, entry, output, progress)
    }

    async fn decide(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> Result<PolicyDecision, RouteError> {
        let budget = self.config.policy_timeout;
        tokio::select! {
            biased;
            () = context.cancellation_token().cancelled() => {
                Err(RouteError::Cancelled { handler: None })
            }
            decided = timeout(
                budget,
                AssertUnwindSafe(self.policy.decide(query, context, &self.catalog)).catch_unwind(),
            ) => {
                let decision = decided
                    .map_err(|_| PolicyError::Timeout(budget))?
                    .map_err(|panic| {
                        PolicyError::Unavailable(format!("policy panicked: {}", panic_message(&*panic)))
                    })??;
                debug!(policy = self.policy.name(), decision = ?decision, "Routing decision");
                Ok(decision)
            }
        }
    }

    async fn invoke(
        &self,
        entry: &RegisteredHandler,
        query: &str,
        context: &QueryContext,
    ) -> Result<HandlerOutput, RouteError> {
        let name = entry.name();
        let budget = self.timeout_for(entry);
        debug!(handler = name, timeout = ?budget, "Invoking handler");

        tokio::select! {
            biased;
            () = context.cancellation_token().cancelled() => Err(RouteError::Cancelled {
                handler: Some(name.to_string()),
            }),
            invoked = timeout(
                budget,
                AssertUnwindSafe(entry.handler().invoke(query, context)).catch_unwind(),
            ) => match invoked {
                Err(_) => Err(RouteError::HandlerTimeout {
                    handler: name.to_string(),
                    timeout: budget,
                }),
                Ok(Err(panic)) => Err(RouteError::HandlerInvocation {
                    handler: name.to_string(),
                    message: format!("handler panicked: {}", panic_message(&*panic)),
                }),
                Ok(Ok(Err(e))) => Err(RouteError::HandlerInvocation {
                    handler: name.to_string(),
                    message: e.to_string(),
                }),
                Ok(Ok(Ok(output))) => Ok(output),
            },
        }
    }

    fn validate_and_present(
        &self,
        request_id: Uuid,
        entry: &RegisteredHandler,
        output: HandlerOutput,
        progress: &mut RouteProgress,
    ) -> Result<ResponseEnvelope, RouteError> {
        let name = entry.name().to_string();
        match entry.kind() {
            ResponseKind::Structured => {
                let schema = entry.schema().ok_or_else(|| RouteError::HandlerInvocation {
                    handler: name.clone(),
                    message: "structured handler has no output schema".to_string(),
                })?;
                let validated = match &output {
                    HandlerOutput::Structured(value) => schema.validate(value),
                    HandlerOutput::Text(raw) => schema.parse(raw),
                };
                let result = validated.map_err(|source| RouteError::SchemaValidation {
                    handler: name.clone(),
                    source,
                })?;
                progress.advance(RouteStage::Presenting);
                let presented = self.presenter.present_structured(schema, &result);
                Ok(ResponseEnvelope::structured(
                    request_id, name, result, presented,
                ))
            }
            kind @ (ResponseKind::Text | ResponseKind::Direct) => {
                let text = match output {
                    HandlerOutput::Text(text) if !text.trim().is_empty() => text,
                    HandlerOutput::Text(_) => {
                        return Err(RouteError::HandlerInvocation {
                            handler: name,
                            message: "handler returned an empty answer".to_string(),
                        });
                    }
                    HandlerOutput::Structured(_) => {
                        return Err(RouteError::HandlerInvocation {
                            handler: name,
                            message: format!("{kind} handler returned structured output"),
                        });
                    }
                };
                progress.advance(RouteStage::Presenting);
                if kind == ResponseKind::Direct {
                    return Ok(ResponseEnvelope::from_direct_handler(request_id, name, text));
                }
                let presented = self.presenter.present_text(&text);
                Ok(ResponseEnvelope::text(request_id, name, text, presented))
            }
        }
    }

    fn timeout_for(&self, entry: &RegisteredHandler) -> Duration {
        self.config
            .handler_timeouts
            .get(entry.name())
            .copied()
            .or_else(|| entry.timeout())
            .unwrap_or(self.config.handler_timeout)
    }

    fn log_failure(&self, request_id: Uuid, query: &str, err: &RouteError) {
        let hash = query_hash(query);
        let handler = err.handler().unwrap_or(DIRECT_SOURCE);
        let error_kind = err.kind().as_str();
        match err {
            RouteError::UnknownHandler { .. } => error!(
                request_id = %request_id,
                handler,
                query_hash = %hash,
                error_kind,
                error = %err,
                "Routing policy selected an unregistered handler"
            ),
            RouteError::Cancelled { .. } => info!(
                request_id = %request_id,
                handler,
                query_hash = %hash,
                error_kind,
                "Request cancelled by caller"
            ),
            _ => warn!(
                request_id = %request_id,
                handler,
                query_hash = %hash,
                error_kind,
                error = %err,
                "Routing failed, presenting fallback"
            ),
        }
    }
}

/// Best-effort text of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
