//! LLM-backed routing policy
//!
//! Sends the catalog-derived instructions and the query to the inference
//! provider and parses the strict JSON decision it returns.

use crate::config::{DEFAULT_LLM_MAX_TOKENS, DEFAULT_ROUTER_MODEL};
use crate::llm::LlmProvider;
use crate::router::handler::QueryContext;
use crate::router::policy::{CatalogEntry, PolicyDecision, PolicyError, RoutingPolicy};
use crate::router::prompt::build_router_instructions;
use crate::utils::{strip_code_fences, truncate_str};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Longest raw response quoted in a malformed-decision error
const MAX_QUOTED_RESPONSE: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecision {
    thought: String,
    handler: Option<String>,
    answer: Option<String>,
}

/// Decision parsed from the model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    /// Model's short reasoning
    pub thought: String,
    /// What to do
    pub decision: PolicyDecision,
}

/// Parse and validate the strict JSON decision format.
///
/// # Errors
///
/// Returns `PolicyError::Malformed` if the response is not a JSON object with a
/// non-empty `thought` and exactly one non-empty `handler` or `answer`.
pub fn parse_routing_decision(raw: &str) -> Result<RoutingDecision, PolicyError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(PolicyError::Malformed("Empty response content".to_string()));
    }

    let parsed: RawDecision = serde_json::from_str(body).map_err(|e| {
        PolicyError::Malformed(format!(
            "JSON parse error: {e} in '{}'",
            truncate_str(body, MAX_QUOTED_RESPONSE)
        ))
    })?;

    if parsed.thought.trim().is_empty() {
        return Err(PolicyError::Malformed(
            "Field 'thought' must be a non-empty string".to_string(),
        ));
    }

    let handler = parsed.handler.map(|h| h.trim().to_string());
    let answer = parsed.answer;
    let decision = match (handler, answer) {
        (Some(handler), None) if !handler.is_empty() => PolicyDecision::Delegate(handler),
        (None, Some(answer)) if !answer.trim().is_empty() => PolicyDecision::Direct(answer),
        (Some(_), Some(_)) | (None, None) => {
            return Err(PolicyError::Malformed(
                "Exactly one of 'handler' or 'answer' must be set".to_string(),
            ));
        }
        _ => {
            return Err(PolicyError::Malformed(
                "Fields 'handler' and 'answer' must be non-empty strings when provided"
                    .to_string(),
            ));
        }
    };

    Ok(RoutingDecision {
        thought: parsed.thought,
        decision,
    })
}

/// Routing policy that asks an LLM to choose
pub struct LlmRoutingPolicy {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    direct_guidance: String,
}

impl LlmRoutingPolicy {
    /// Create a policy using the default router model
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, direct_guidance: impl Into<String>) -> Self {
        Self {
            provider,
            model: DEFAULT_ROUTER_MODEL.to_string(),
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
            direct_guidance: direct_guidance.into(),
        }
    }

    /// Use a specific model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Limit output tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl RoutingPolicy for LlmRoutingPolicy {
    fn name(&self) -> &str {
        "llm"
    }

    async fn decide(
        &self,
        query: &str,
        context: &QueryContext,
        catalog: &[CatalogEntry],
    ) -> Result<PolicyDecision, PolicyError> {
        let instructions = build_router_instructions(catalog, &self.direct_guidance);
        let raw = self
            .provider
            .chat_completion(
                &instructions,
                context.history(),
                query,
                &self.model,
                self.max_tokens,
            )
            .await?;

        match parse_routing_decision(&raw) {
            Ok(parsed) => {
                debug!(model = %self.model, thought = %parsed.thought, "Routing decision parsed");
                Ok(parsed.decision)
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Routing decision rejected");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, Message, MockLlmProvider};
    use crate::router::handler::ResponseKind;

    #[test]
    fn parses_handler_decision() {
        let raw = r#"{"thought":"order status","handler":"order_lookup","answer":null}"#;
        let parsed = parse_routing_decision(raw).expect("valid decision");
        assert_eq!(
            parsed.decision,
            PolicyDecision::Delegate("order_lookup".to_string())
        );
        assert_eq!(parsed.thought, "order status");
    }

    #[test]
    fn parses_fenced_direct_answer_without_handler_key() {
        let raw = "```json\n{\"thought\":\"faq\",\"answer\":\"We are open 24/7 online.\"}\n```";
        let parsed = parse_routing_decision(raw).expect("valid decision");
        assert_eq!(
            parsed.decision,
            PolicyDecision::Direct("We are open 24/7 online.".to_string())
        );
    }

    #[test]
    fn rejects_both_or_neither() {
        let both = r#"{"thought":"x","handler":"tech_support","answer":"hi"}"#;
        let neither = r#"{"thought":"x","handler":null,"answer":null}"#;
        assert!(matches!(
            parse_routing_decision(both),
            Err(PolicyError::Malformed(_))
        ));
        assert!(matches!(
            parse_routing_decision(neither),
            Err(PolicyError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_blank_fields_and_extra_keys() {
        for raw in [
            r#"{"thought":"  ","handler":"tech_support","answer":null}"#,
            r#"{"thought":"x","handler":"  ","answer":null}"#,
            r#"{"thought":"x","handler":null,"answer":""}"#,
            r#"{"thought":"x","handler":"tech_support","answer":null,"confidence":0.9}"#,
            "I think tech_support should handle this",
            "",
        ] {
            assert!(
                matches!(parse_routing_decision(raw), Err(PolicyError::Malformed(_))),
                "should reject {raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn decide_sends_catalog_to_model() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat_completion()
            .withf(|system, history, user, model, _| {
                system.contains("- tech_support:")
                    && history.is_empty()
                    && user == "My headphones won't pair"
                    && model == "router-model"
            })
            .times(1)
            .returning(|_, _, _, _, _| {
                Ok(r#"{"thought":"hardware","handler":"tech_support","answer":null}"#.to_string())
            });

        let policy = LlmRoutingPolicy::new(Arc::new(mock), "- Hours").with_model("router-model");
        let catalog = vec![CatalogEntry {
            name: "tech_support".to_string(),
            kind: ResponseKind::Text,
            description: "Troubleshooting".to_string(),
        }];
        let decision = policy
            .decide("My headphones won't pair", &QueryContext::new(), &catalog)
            .await
            .expect("decision");
        assert_eq!(decision, PolicyDecision::Delegate("tech_support".to_string()));
    }

    #[tokio::test]
    async fn decide_forwards_conversation_history() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat_completion()
            .withf(|_, history, user, _, _| {
                history == [
                    Message::user("Check order ORD-2024-001"),
                    Message::assistant("Status: delivered"),
                ]
                    && user == "Can I get a refund for it?"
            })
            .times(1)
            .returning(|_, _, _, _, _| {
                Ok(r#"{"thought":"follow-up","handler":"refund_processor","answer":null}"#.to_string())
            });

        let policy = LlmRoutingPolicy::new(Arc::new(mock), "");
        let ctx = QueryContext::new().with_history(vec![
            Message::user("Check order ORD-2024-001"),
            Message::assistant("Status: delivered"),
        ]);
        let decision = policy
            .decide("Can I get a refund for it?", &ctx, &[])
            .await
            .expect("decision");
        assert_eq!(
            decision,
            PolicyDecision::Delegate("refund_processor".to_string())
        );
    }

    #[tokio::test]
    async fn provider_errors_become_policy_errors() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat_completion()
            .returning(|_, _, _, _, _| Err(LlmError::ApiError("500".to_string())));
        let policy = LlmRoutingPolicy::new(Arc::new(mock), "");
        let result = policy.decide("hi", &QueryContext::new(), &[]).await;
        assert!(matches!(result, Err(PolicyError::Llm(LlmError::ApiError(_)))));
    }
}
