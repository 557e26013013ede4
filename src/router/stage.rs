//! Per-request routing state machine
//!
//! `RECEIVED -> POLICY_SELECTED -> {DIRECT | INVOKING -> VALIDATING ->
//! PRESENTING} -> DONE`, with every failure edge going through
//! `FAILED -> PRESENTING` (fallback).

use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Stage of one routing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteStage {
    /// Query accepted
    Received,
    /// Policy has decided
    PolicySelected,
    /// Policy answered directly
    Direct,
    /// Handler running
    Invoking,
    /// Handler output being checked
    Validating,
    /// Presented text being rendered
    Presenting,
    /// A failure occurred; a fallback will be presented
    Failed,
    /// Envelope produced
    Done,
}

impl RouteStage {
    /// Whether `next` is a legal successor of `self`
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        use RouteStage::{
            Direct, Done, Failed, Invoking, PolicySelected, Presenting, Received, Validating,
        };
        matches!(
            (self, next),
            (Received, PolicySelected | Failed)
                | (PolicySelected, Direct | Invoking | Failed)
                | (Direct | Presenting, Done)
                | (Invoking, Validating | Failed)
                | (Validating, Presenting | Failed)
                | (Failed, Presenting)
        )
    }

    /// Upper-case label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::PolicySelected => "POLICY_SELECTED",
            Self::Direct => "DIRECT",
            Self::Invoking => "INVOKING",
            Self::Validating => "VALIDATING",
            Self::Presenting => "PRESENTING",
            Self::Failed => "FAILED",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for RouteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the stages visited by one request
#[derive(Debug, Clone)]
pub struct RouteProgress {
    request_id: Uuid,
    trail: Vec<RouteStage>,
}

impl RouteProgress {
    /// New request in `RECEIVED`
    #[must_use]
    pub fn start(request_id: Uuid) -> Self {
        Self {
            request_id,
            trail: vec![RouteStage::Received],
        }
    }

    /// Current stage
    #[must_use]
    pub fn current(&self) -> RouteStage {
        self.trail.last().copied().unwrap_or(RouteStage::Received)
    }

    /// Move to `next`. Illegal transitions are programming errors.
    pub fn advance(&mut self, next: RouteStage) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "illegal route transition {current} -> {next}"
        );
        debug!(request_id = %self.request_id, from = %current, to = %next, "Route stage");
        self.trail.push(next);
    }

    /// Move to `FAILED` unless already there
    pub fn fail(&mut self) {
        if self.current() != RouteStage::Failed {
            self.advance(RouteStage::Failed);
        }
    }

    /// Stages visited so far
    #[must_use]
    pub fn trail(&self) -> &[RouteStage] {
        &self.trail
    }

    /// Whether the request went through `FAILED`
    #[must_use]
    pub fn failed(&self) -> bool {
        self.trail.contains(&RouteStage::Failed)
    }
}
