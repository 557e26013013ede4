//! LLM-backed capability handler
//!
//! Runs one inference call with a fixed instruction. Structured sub-agents get
//! a JSON-only output contract appended to their instruction; their raw text is
//! validated by the router, not here.

use super::LlmProvider;
use crate::config::{DEFAULT_LLM_MAX_TOKENS, DEFAULT_SUB_AGENT_MODEL};
use crate::router::prompt::build_structured_output_contract;
use crate::router::schema::OutputSchema;
use crate::router::{CapabilityHandler, HandlerError, HandlerOutput, QueryContext, ResponseKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Capability handler that delegates to an LLM
pub struct LlmSubAgentHandler {
    name: String,
    description: String,
    kind: ResponseKind,
    system_prompt: String,
    schema: Option<OutputSchema>,
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl LlmSubAgentHandler {
    fn build(
        name: impl Into<String>,
        kind: ResponseKind,
        system_prompt: String,
        schema: Option<OutputSchema>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            system_prompt,
            schema,
            provider,
            model: DEFAULT_SUB_AGENT_MODEL.to_string(),
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
        }
    }

    /// Sub-agent that answers in free text
    #[must_use]
    pub fn text(
        name: impl Into<String>,
        instruction: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self::build(name, ResponseKind::Text, instruction.into(), None, provider)
    }

    /// Sub-agent that answers with JSON conforming to `schema`
    #[must_use]
    pub fn structured(
        name: impl Into<String>,
        instruction: impl Into<String>,
        schema: OutputSchema,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        let system_prompt = format!(
            "{}\n\n{}",
            instruction.into().trim_end(),
            build_structured_output_contract(&schema)
        );
        Self::build(
            name,
            ResponseKind::Structured,
            system_prompt,
            Some(schema),
            provider,
        )
    }

    /// Set the catalog description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
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

    /// Full system prompt sent to the model
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

/// Prefix the query with the caller's session attributes, if any
fn build_user_message(query: &str, context: &QueryContext) -> String {
    if context.attributes().is_empty() {
        return query.to_string();
    }
    let attributes = context
        .attributes()
        .iter()
        .map(|(key, value)| format!("- {key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Customer context:\n{attributes}\n\nRequest: {query}")
}

#[async_trait]
impl CapabilityHandler for LlmSubAgentHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResponseKind {
        self.kind
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_schema(&self) -> Option<&OutputSchema> {
        self.schema.as_ref()
    }

    async fn invoke(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let user_message = build_user_message(query, context);
        debug!(
            handler = %self.name,
            model = %self.model,
            history = context.history().len(),
            "Calling sub-agent model"
        );
        let answer = self
            .provider
            .chat_completion(
                &self.system_prompt,
                context.history(),
                &user_message,
                &self.model,
                self.max_tokens,
            )
            .await?;
        Ok(HandlerOutput::Text(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, Message, MockLlmProvider};
    use crate::router::schema::{FieldSpec, FieldType};

    #[tokio::test]
    async fn text_sub_agent_relays_model_answer() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat_completion()
            .withf(|system, _, user, model, _| {
                system == "Help with gadgets."
                    && user.contains("- customer: Jane")
                    && user.ends_with("Request: Watch won't charge")
                    && model == "small"
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok("Clean the charging contacts.".to_string()));

        let handler = LlmSubAgentHandler::text("tech_support", "Help with gadgets.", Arc::new(mock))
            .with_model("small");
        let ctx = QueryContext::new().with_attribute("customer", "Jane");
        let out = handler.invoke("Watch won't charge", &ctx).await.expect("answer");
        assert_eq!(out, HandlerOutput::text("Clean the charging contacts."));
        assert_eq!(handler.kind(), ResponseKind::Text);
        assert!(handler.output_schema().is_none());
    }

    #[tokio::test]
    async fn structured_sub_agent_appends_contract() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat_completion()
            .returning(|_, _, _, _, _| Err(LlmError::NetworkError("reset".to_string())));
        let schema =
            OutputSchema::new("OrderInfo").field(FieldSpec::required("order_id", FieldType::String));
        let handler =
            LlmSubAgentHandler::structured("order_lookup", "Find orders.", schema, Arc::new(mock));

        assert!(handler.system_prompt().starts_with("Find orders.\n\n## OUTPUT FORMAT"));
        assert!(handler.output_schema().is_some());
        let err = handler
            .invoke("ORD-1", &QueryContext::new())
            .await
            .expect_err("provider failure");
        assert!(matches!(err, HandlerError::Llm(LlmError::NetworkError(_))));
    }

    #[tokio::test]
    async fn sub_agent_sees_earlier_turns() {
        let mut mock = MockLlmProvider::new();
        mock.expect_chat_completion()
            .withf(|_, history, user, _, _| {
                history.len() == 2 && history[0].content == "My watch is dead" && user == "Still nothing"
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok("Try a different cable.".to_string()));

        let handler = LlmSubAgentHandler::text("tech_support", "Help with gadgets.", Arc::new(mock));
        let ctx = QueryContext::new().with_history(vec![
            Message::user("My watch is dead"),
            Message::assistant("Charge it for 30 minutes."),
        ]);
        let out = handler.invoke("Still nothing", &ctx).await.expect("answer");
        assert_eq!(out, HandlerOutput::text("Try a different cable."));
    }

    #[test]
    fn plain_query_without_attributes() {
        assert_eq!(build_user_message("hi", &QueryContext::new()), "hi");
    }

    #[test]
    fn attributes_are_listed_before_the_request() {
        let ctx = QueryContext::new()
            .with_attribute("customer", "Jane")
            .with_attribute("tier", "gold");
        assert_eq!(
            build_user_message("Watch won't charge", &ctx),
            "Customer context:\n- customer: Jane\n- tier: gold\n\nRequest: Watch won't charge"
        );
    }
}
