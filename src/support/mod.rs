//! Customer-support capability catalog
//!
//! Three specialists sit behind the router: `order_lookup` and
//! `refund_processor` return structured records, `tech_support` returns plain
//! troubleshooting text. Store policies are answered directly.

/// Direct answers
pub mod faq;
/// Order book and `order_lookup`
pub mod orders;
/// Refund policy and `refund_processor`
pub mod refunds;
/// Output schemas of the structured specialists
pub mod schemas;
/// Troubleshooting knowledge base and `tech_support`
pub mod tech;

pub use faq::direct_guidance;
pub use orders::{OrderBook, OrderInfo, OrderItem, OrderLookupHandler, OrderStatus, ORDER_LOOKUP};
pub use refunds::{RefundPolicy, RefundProcessor, RefundResult, RefundStatus, REFUND_PROCESSOR};
pub use tech::{tech_support_sub_agent, TechSupportHandler, TECH_SUPPORT};

use crate::llm::LlmSubAgentHandler;
use crate::router::{HandlerRegistry, KeywordPolicy, RegistryError};
use chrono::NaiveDate;
use std::sync::Arc;

const REFUND_KEYWORDS: &[&str] = &[
    "refund",
    "refunds",
    "money back",
    "return this",
    "return it",
    "return my",
    "send it back",
    "cancel",
    "cancellation",
];

const ORDER_KEYWORDS: &[&str] = &[
    "order",
    "orders",
    "tracking",
    "track",
    "where is my",
    "package",
    "shipped",
];

const TECH_KEYWORDS: &[&str] = &[
    "not working",
    "doesn't work",
    "won't",
    "broken",
    "issue",
    "problem",
    "troubleshoot",
    "sticking",
    "stuck",
    "connect",
    "pair",
    "headphones",
    "keyboard",
    "smartwatch",
    "laptop stand",
    "mouse pad",
    "usb-c",
    "cable",
];

/// Registry with the three support specialists.
///
/// `tech_agent` replaces the built-in knowledge base for `tech_support`.
///
/// # Errors
///
/// Returns [`RegistryError`] if the catalog is inconsistent.
pub fn support_registry(
    today: NaiveDate,
    tech_agent: Option<LlmSubAgentHandler>,
) -> Result<HandlerRegistry, RegistryError> {
    let book = Arc::new(OrderBook::sample());
    let builder = HandlerRegistry::builder()
        .register(OrderLookupHandler::new(Arc::clone(&book)))
        .register(RefundProcessor::new(book, today));
    match tech_agent {
        Some(agent) => builder.register(agent),
        None => builder.register(TechSupportHandler),
    }
    .build()
}

/// Keyword routing over the support catalog: refunds, then orders, then
/// technical issues, then the FAQ.
#[must_use]
pub fn support_policy() -> KeywordPolicy {
    faq::FAQ.iter().fold(
        KeywordPolicy::new(faq::CLARIFY)
            .route(REFUND_PROCESSOR, REFUND_KEYWORDS)
            .route(ORDER_LOOKUP, ORDER_KEYWORDS)
            .route(TECH_SUPPORT, TECH_KEYWORDS),
        |policy, entry| policy.faq(entry.keywords, entry.answer),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{PolicyDecision, ResponseKind};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 2).expect("valid date")
    }

    #[test]
    fn registry_holds_three_specialists() {
        let registry = support_registry(today(), None).expect("valid catalog");
        assert_eq!(registry.len(), 3);
        let kinds: Vec<_> = registry.catalog().into_iter().map(|e| (e.name, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (ORDER_LOOKUP.to_string(), ResponseKind::Structured),
                (REFUND_PROCESSOR.to_string(), ResponseKind::Structured),
                (TECH_SUPPORT.to_string(), ResponseKind::Text),
            ]
        );
    }

    #[test]
    fn policy_prefers_refund_over_order() {
        let policy = support_policy();
        assert_eq!(
            policy.classify("I want a refund for order ORD-2024-001"),
            PolicyDecision::Delegate(REFUND_PROCESSOR.to_string())
        );
        assert_eq!(
            policy.classify("What are your hours?"),
            PolicyDecision::Direct(faq::HOURS.to_string())
        );
        assert_eq!(
            policy.classify("asdf"),
            PolicyDecision::Direct(faq::CLARIFY.to_string())
        );
    }
}
