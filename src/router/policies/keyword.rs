//! Deterministic keyword routing policy
//!
//! Used offline and in tests. Rules map keyword phrases to a handler, FAQ
//! entries map keyword phrases to a direct answer. Matching is
//! case-insensitive on word boundaries; rules are checked before FAQ entries
//! and the first match wins.

use crate::router::handler::QueryContext;
use crate::router::policy::{CatalogEntry, PolicyDecision, PolicyError, RoutingPolicy};
use crate::utils::{contains_phrase, normalize_for_match};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone)]
struct Rule {
    keywords: Vec<String>,
    handler: String,
}

#[derive(Debug, Clone)]
struct FaqEntry {
    keywords: Vec<String>,
    answer: String,
}

/// Routing policy driven by keyword tables
#[derive(Debug, Clone)]
pub struct KeywordPolicy {
    rules: Vec<Rule>,
    faq: Vec<FaqEntry>,
    default_answer: String,
}

fn owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| (*k).to_string()).collect()
}

fn matches_any(normalized: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| contains_phrase(normalized, k))
}

impl KeywordPolicy {
    /// Policy that answers `default_answer` when nothing matches
    #[must_use]
    pub fn new(default_answer: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            faq: Vec::new(),
            default_answer: default_answer.into(),
        }
    }

    /// Delegate to `handler` when any keyword phrase occurs
    #[must_use]
    pub fn route(mut self, handler: impl Into<String>, keywords: &[&str]) -> Self {
        self.rules.push(Rule {
            keywords: owned(keywords),
            handler: handler.into(),
        });
        self
    }

    /// Answer directly when any keyword phrase occurs
    #[must_use]
    pub fn faq(mut self, keywords: &[&str], answer: impl Into<String>) -> Self {
        self.faq.push(FaqEntry {
            keywords: owned(keywords),
            answer: answer.into(),
        });
        self
    }

    /// Pure decision for a query
    #[must_use]
    pub fn classify(&self, query: &str) -> PolicyDecision {
        let normalized = normalize_for_match(query);
        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| matches_any(&normalized, &rule.keywords))
        {
            return PolicyDecision::Delegate(rule.handler.clone());
        }
        if let Some(entry) = self
            .faq
            .iter()
            .find(|entry| matches_any(&normalized, &entry.keywords))
        {
            return PolicyDecision::Direct(entry.answer.clone());
        }
        PolicyDecision::Direct(self.default_answer.clone())
    }
}

#[async_trait]
impl RoutingPolicy for KeywordPolicy {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn decide(
        &self,
        query: &str,
        _context: &QueryContext,
        _catalog: &[CatalogEntry],
    ) -> Result<PolicyDecision, PolicyError> {
        let decision = self.classify(query);
        debug!(decision = ?decision, "Keyword policy decision");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> KeywordPolicy {
        KeywordPolicy::new("Could you tell me more?")
            .route("refund_processor", &["refund", "money back"])
            .route("order_lookup", &["order", "tracking"])
            .faq(&["hours", "open"], "We are open 24/7 online.")
    }

    #[test]
    fn first_matching_rule_wins() {
        assert_eq!(
            policy().classify("I want a REFUND for order ORD-2024-001"),
            PolicyDecision::Delegate("refund_processor".to_string())
        );
        assert_eq!(
            policy().classify("Where is my order?"),
            PolicyDecision::Delegate("order_lookup".to_string())
        );
    }

    #[test]
    fn matches_on_word_boundaries_only() {
        // "reorder" must not match "order", "opened" must not match "open"
        assert_eq!(
            policy().classify("Can I reorder the opened box?"),
            PolicyDecision::Direct("Could you tell me more?".to_string())
        );
    }

    #[test]
    fn multi_word_phrases_match() {
        assert_eq!(
            policy().classify("I just want my money back!"),
            PolicyDecision::Delegate("refund_processor".to_string())
        );
    }

    #[test]
    fn rules_before_faq() {
        assert_eq!(
            policy().classify("What are your hours for order pickup?"),
            PolicyDecision::Delegate("order_lookup".to_string())
        );
        assert_eq!(
            policy().classify("What are your hours?"),
            PolicyDecision::Direct("We are open 24/7 online.".to_string())
        );
    }
}
