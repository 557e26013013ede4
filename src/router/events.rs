//! Observability events and sinks
//!
//! The router emits exactly one [`RouteEvent`] per call. Sinks must not block
//! and their errors never fail a request.

use super::error::ErrorKind;
use super::handler::ResponseKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of one routing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    /// Envelope produced from the policy or handler result
    Success,
    /// Fallback envelope produced after a failure
    Failure(ErrorKind),
}

impl Outcome {
    /// Whether the call succeeded
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One observability record per routing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEvent {
    /// When the call finished
    pub timestamp: DateTime<Utc>,
    /// Shared with the envelope
    pub request_id: Uuid,
    /// Selected handler, or `"none"`
    pub handler_name: String,
    /// Declared kind of the selected handler, or `DIRECT`
    pub kind: ResponseKind,
    /// Wall-clock duration of the whole call
    pub latency_ms: u64,
    /// Success or failure kind
    pub outcome: Outcome,
}

/// Sink delivery failure
#[derive(Debug, Error)]
pub enum SinkError {
    /// Channel is full or closed
    #[error("event channel unavailable: {0}")]
    Channel(String),
    /// Sink state is unusable
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only consumer of routing events
pub trait ObservabilitySink: Send + Sync {
    /// Record one event without blocking.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the event could not be delivered.
    fn record(&self, event: &RouteEvent) -> Result<(), SinkError>;
}

/// Emits each event as a structured `tracing` record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record(&self, event: &RouteEvent) -> Result<(), SinkError> {
        match event.outcome {
            Outcome::Success => info!(
                request_id = %event.request_id,
                handler = %event.handler_name,
                kind = %event.kind,
                latency_ms = event.latency_ms,
                "Route completed"
            ),
            Outcome::Failure(error_kind) => warn!(
                request_id = %event.request_id,
                handler = %event.handler_name,
                kind = %event.kind,
                latency_ms = event.latency_ms,
                error_kind = %error_kind,
                "Route fell back"
            ),
        }
        Ok(())
    }
}

/// Forwards events to a bounded channel, dropping them when it is full
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<RouteEvent>,
}

impl ChannelSink {
    /// Wrap an existing sender
    #[must_use]
    pub const fn new(tx: mpsc::Sender<RouteEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiving end of its channel
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RouteEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl ObservabilitySink for ChannelSink {
    fn record(&self, event: &RouteEvent) -> Result<(), SinkError> {
        self.tx
            .try_send(event.clone())
            .map_err(|e| SinkError::Channel(e.to_string()))
    }
}

/// Keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<RouteEvent>>>,
}

impl MemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<RouteEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObservabilitySink for MemorySink {
    fn record(&self, event: &RouteEvent) -> Result<(), SinkError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| SinkError::Unavailable("event buffer poisoned".to_string()))?;
        events.push(event.clone());
        Ok(())
    }
}

/// Delivers to every inner sink; reports the first failure after trying all
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ObservabilitySink>>,
}

impl FanoutSink {
    /// Empty fan-out
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ObservabilitySink for FanoutSink {
    fn record(&self, event: &RouteEvent) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(outcome: Outcome) -> RouteEvent {
        RouteEvent {
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
            handler_name: "order_lookup".to_string(),
            kind: ResponseKind::Structured,
            latency_ms: 12,
            outcome,
        }
    }

    struct Broken;

    impl ObservabilitySink for Broken {
        fn record(&self, _event: &RouteEvent) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("down".to_string()))
        }
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.record(&event(Outcome::Success)).expect("recorded");
        sink.record(&event(Outcome::Failure(ErrorKind::HandlerTimeout)))
            .expect("recorded");
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].outcome.is_success());
        assert_eq!(
            events[1].outcome,
            Outcome::Failure(ErrorKind::HandlerTimeout)
        );
    }

    #[tokio::test]
    async fn channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::channel(1);
        assert!(sink.record(&event(Outcome::Success)).is_ok());
        assert!(matches!(
            sink.record(&event(Outcome::Success)),
            Err(SinkError::Channel(_))
        ));
        assert!(rx.recv().await.is_some());
    }

    #[test]
    fn fanout_delivers_to_healthy_sinks_despite_failures() {
        let memory = MemorySink::new();
        let fanout = FanoutSink::new()
            .with(Arc::new(Broken))
            .with(Arc::new(memory.clone()));
        assert!(fanout.record(&event(Outcome::Success)).is_err());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(Outcome::Failure(ErrorKind::UnknownHandler))
            .expect("serializable");
        assert_eq!(value["status"], "failure");
        assert_eq!(value["error"], "unknown_handler");
        let value = serde_json::to_value(Outcome::Success).expect("serializable");
        assert_eq!(value["status"], "success");
    }
}
