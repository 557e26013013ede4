//! Refund policy and the `refund_processor` handler
//!
//! Delivered orders are refunded in full within 30 days, at 50% between 31
//! and 60 days and not at all afterwards. Cancelled orders were already
//! refunded. Pending and shipped orders can be cancelled for a full refund.

use super::orders::{extract_order_id, OrderBook, OrderInfo, OrderStatus};
use super::schemas::refund_result_schema;
use crate::router::schema::OutputSchema;
use crate::router::{CapabilityHandler, HandlerError, HandlerOutput, QueryContext, ResponseKind};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

/// Handler name
pub const REFUND_PROCESSOR: &str = "refund_processor";
/// Last day of the full-refund window
pub const FULL_REFUND_DAYS: i64 = 30;
/// Last day of the partial-refund window
pub const PARTIAL_REFUND_DAYS: i64 = 60;
/// Processing time quoted for approved refunds
pub const APPROVED_PROCESSING_TIME: &str = "3-5 business days";
/// Refund method for approved refunds
pub const ORIGINAL_PAYMENT_METHOD: &str = "original payment method";
const NOT_APPLICABLE: &str = "N/A";

/// Outcome of a refund request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    /// Refund will be paid
    Approved,
    /// Refund is refused
    Rejected,
    /// Needs manual review
    Pending,
}

/// Refund decision as returned by `refund_processor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundResult {
    /// Unique refund identifier (`REF-YYYY-NNN`)
    pub refund_id: String,
    /// Associated order ID
    pub order_id: String,
    /// Decision
    pub status: RefundStatus,
    /// Amount refunded
    pub refund_amount: f64,
    /// Reason for the decision
    pub reason: String,
    /// Expected processing time
    pub processing_time: String,
    /// How the money is returned
    pub refund_method: String,
}

/// Policy verdict before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundAssessment {
    /// Decision
    pub status: RefundStatus,
    /// Amount in cents
    pub amount_cents: i64,
    /// Customer-facing reason
    pub reason: String,
}

impl RefundAssessment {
    fn new(status: RefundStatus, amount_cents: i64, reason: impl Into<String>) -> Self {
        Self {
            status,
            amount_cents,
            reason: reason.into(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[allow(clippy::cast_precision_loss)]
fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Date-based refund rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundPolicy {
    today: NaiveDate,
}

impl RefundPolicy {
    /// Policy evaluated as of `today`
    #[must_use]
    pub const fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Reference date
    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }

    /// Apply the policy to an order
    #[must_use]
    pub fn assess(&self, order: &OrderInfo) -> RefundAssessment {
        let total = to_cents(order.total_amount);
        match order.status {
            OrderStatus::NotFound => {
                RefundAssessment::new(RefundStatus::Rejected, 0, "Order not found")
            }
            OrderStatus::Cancelled => RefundAssessment::new(
                RefundStatus::Rejected,
                0,
                "Order was cancelled and has already been refunded",
            ),
            OrderStatus::Pending | OrderStatus::Shipped => RefundAssessment::new(
                RefundStatus::Approved,
                total,
                format!(
                    "Order is {} and can be cancelled for a full refund",
                    order.status
                ),
            ),
            OrderStatus::Delivered => {
                let Some(date) = order.date() else {
                    return RefundAssessment::new(
                        RefundStatus::Pending,
                        0,
                        "Delivery date is unknown; the request needs manual review",
                    );
                };
                let days = (self.today - date).num_days().max(0);
                if days <= FULL_REFUND_DAYS {
                    RefundAssessment::new(
                        RefundStatus::Approved,
                        total,
                        format!("Delivered {days} days ago, within the {FULL_REFUND_DAYS}-day full refund window"),
                    )
                } else if days <= PARTIAL_REFUND_DAYS {
                    RefundAssessment::new(
                        RefundStatus::Approved,
                        (total + 1) / 2,
                        format!("Delivered {days} days ago, eligible for a 50% refund"),
                    )
                } else {
                    RefundAssessment::new(
                        RefundStatus::Rejected,
                        0,
                        format!("Delivered {days} days ago, outside the {PARTIAL_REFUND_DAYS}-day refund window"),
                    )
                }
            }
        }
    }
}

/// Structured handler applying [`RefundPolicy`] to orders from an [`OrderBook`]
pub struct RefundProcessor {
    book: Arc<OrderBook>,
    policy: RefundPolicy,
    sequence: AtomicU32,
    schema: OutputSchema,
}

impl RefundProcessor {
    /// Handler evaluating refunds as of `today`
    #[must_use]
    pub fn new(book: Arc<OrderBook>, today: NaiveDate) -> Self {
        Self {
            book,
            policy: RefundPolicy::new(today),
            sequence: AtomicU32::new(0),
            schema: refund_result_schema(),
        }
    }

    fn next_refund_id(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("REF-{}-{n:03}", self.policy.today().year())
    }

    /// Decide a refund request for the order mentioned in `query`
    #[must_use]
    pub fn process(&self, query: &str) -> RefundResult {
        let requested_id = extract_order_id(query);
        let order = self
            .book
            .lookup(query)
            .cloned()
            .unwrap_or_else(OrderInfo::not_found);
        let assessment = self.policy.assess(&order);

        let refund_id = if order.is_not_found() {
            NOT_APPLICABLE.to_string()
        } else {
            self.next_refund_id()
        };
        let order_id = if order.is_not_found() {
            requested_id.unwrap_or_else(|| order.order_id.clone())
        } else {
            order.order_id.clone()
        };
        let (processing_time, refund_method) = match assessment.status {
            RefundStatus::Approved => (APPROVED_PROCESSING_TIME, ORIGINAL_PAYMENT_METHOD),
            RefundStatus::Pending => ("Pending manual review", NOT_APPLICABLE),
            RefundStatus::Rejected => (NOT_APPLICABLE, NOT_APPLICABLE),
        };

        info!(
            refund_id = %refund_id,
            order_id = %order_id,
            status = ?assessment.status,
            amount_cents = assessment.amount_cents,
            "Refund request processed"
        );

        RefundResult {
            refund_id,
            order_id,
            status: assessment.status,
            refund_amount: from_cents(assessment.amount_cents),
            reason: assessment.reason,
            processing_time: processing_time.to_string(),
            refund_method: refund_method.to_string(),
        }
    }
}

#[async_trait]
impl CapabilityHandler for RefundProcessor {
    fn name(&self) -> &str {
        REFUND_PROCESSOR
    }

    fn kind(&self) -> ResponseKind {
        ResponseKind::Structured
    }

    fn description(&self) -> &str {
        "Processes refund requests and returns structured refund decision"
    }

    fn output_schema(&self) -> Option<&OutputSchema> {
        Some(&self.schema)
    }

    async fn invoke(
        &self,
        query: &str,
        _context: &QueryContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let result = self.process(query);
        Ok(HandlerOutput::Structured(serde_json::to_value(result)?))
    }
}
