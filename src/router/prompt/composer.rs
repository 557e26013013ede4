//! Prompt composer module
//!
//! Builds the routing instructions from the handler catalog, and the JSON-only
//! output contract appended to structured sub-agents.

use crate::router::handler::ResponseKind;
use crate::router::policy::CatalogEntry;
use crate::router::schema::OutputSchema;
use std::fmt::Write;

const ROUTER_PREAMBLE: &str = "You are the routing step of a customer support assistant. For every customer message decide whether you can answer it yourself or which specialist must handle it. Never invent order data, refund decisions or troubleshooting steps; delegate them.";

/// What the policy should expect back from a handler of this kind
#[must_use]
pub const fn kind_summary(kind: ResponseKind) -> &'static str {
    match kind {
        ResponseKind::Direct => "returns a ready answer that is shown as is",
        ResponseKind::Structured => {
            "returns STRUCTURED JSON data that is validated and formatted for the customer"
        }
        ResponseKind::Text => "returns PLAIN TEXT guidance that is relayed to the customer",
    }
}

fn build_catalog_section(catalog: &[CatalogEntry]) -> String {
    if catalog.is_empty() {
        return "No specialists are available. Always answer directly.".to_string();
    }
    let mut section = String::new();
    for entry in catalog {
        let description = if entry.description.trim().is_empty() {
            "No description"
        } else {
            entry.description.trim()
        };
        // Writing to a String cannot fail
        let _ = writeln!(
            section,
            "- {}: {}. This specialist {}.",
            entry.name,
            description.trim_end_matches('.'),
            kind_summary(entry.kind)
        );
    }
    section.trim_end().to_string()
}

/// Build the system instructions for the LLM routing policy
#[must_use]
pub fn build_router_instructions(catalog: &[CatalogEntry], direct_guidance: &str) -> String {
    let specialists = build_catalog_section(catalog);
    let guidance = direct_guidance.trim();
    let guidance = if guidance.is_empty() {
        "Greetings and general conversation."
    } else {
        guidance
    };

    format!(
        r#"{ROUTER_PREAMBLE}

## DIRECT ANSWERS
You may answer these without a specialist:
{guidance}

## SPECIALISTS
{specialists}

## STRUCTURED OUTPUT (MANDATORY)
You MUST respond ONLY with a valid JSON object strictly following the schema:
{{
  "thought": "Brief reason for the decision",
  "handler": "specialist_name",
  "answer": "Direct answer to the customer"
}}

Rules:
- EXACTLY one of `handler` or `answer` must be filled (the other = null)
- `handler` must be one of the specialist names listed above, spelled exactly
- Use `answer` only for the direct answers listed above
- If the request is unclear, use `answer` to ask the customer for clarification
- No extra keys, markdown, or text outside JSON"#
    )
}

/// Output contract appended to the instruction of a structured sub-agent
#[must_use]
pub fn build_structured_output_contract(schema: &OutputSchema) -> String {
    let schema_json =
        serde_json::to_string_pretty(&schema.describe()).unwrap_or_else(|_| "{}".to_string());
    format!(
        "## OUTPUT FORMAT (MANDATORY)\nReturn ONLY one JSON object matching the {} schema below. Do not include any additional text, explanations or markdown.\n{schema_json}",
        schema.title()
    )
}
