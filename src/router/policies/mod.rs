//! Routing policy implementations

mod keyword;
mod llm;

pub use keyword::KeywordPolicy;
pub use llm::{parse_routing_decision, LlmRoutingPolicy, RoutingDecision};
