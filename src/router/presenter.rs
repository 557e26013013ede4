//! Presentation step
//!
//! Turns a validated payload into the text shown to the end user. Structured
//! results become one `Label: value` line per declared field, in declaration
//! order; text results are relayed verbatim.

use super::schema::{FieldSpec, FieldType, OutputSchema, StructuredResult};
use serde_json::Value;

/// Rendering of a null optional field
pub const NOT_PROVIDED: &str = "not provided";
/// Rendering of an empty list
pub const EMPTY_LIST: &str = "none";

/// Renders validated payloads into presented text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presenter {
    text_frame: Option<String>,
    structured_heading: bool,
}

impl Presenter {
    /// Presenter with no frame and no heading
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix relayed text with a constant phrase and a blank line
    #[must_use]
    pub fn with_text_frame(mut self, frame: impl Into<String>) -> Self {
        let frame = frame.into();
        self.text_frame = (!frame.trim().is_empty()).then_some(frame);
        self
    }

    /// Start structured renderings with a heading derived from the schema title
    #[must_use]
    pub const fn with_structured_heading(mut self, enabled: bool) -> Self {
        self.structured_heading = enabled;
        self
    }

    /// Render a text payload. Rendering is a pure function of the payload.
    #[must_use]
    pub fn present_text(&self, text: &str) -> String {
        match &self.text_frame {
            Some(frame) => format!("{frame}\n\n{text}"),
            None => text.to_string(),
        }
    }

    /// Render every declared field of a validated result, in declaration order
    #[must_use]
    pub fn present_structured(&self, schema: &OutputSchema, result: &StructuredResult) -> String {
        let mut lines = Vec::with_capacity(schema.fields().len() + 1);
        if self.structured_heading && !schema.title().is_empty() {
            lines.push(humanize_title(schema.title()));
        }
        for spec in schema.fields() {
            let value = result.get(spec.name()).unwrap_or(&Value::Null);
            render_field(spec, value, &mut lines);
        }
        lines.join("\n")
    }
}

fn render_field(spec: &FieldSpec, value: &Value, lines: &mut Vec<String>) {
    let label = spec.display_label();
    match (spec.field_type(), value) {
        (FieldType::List(inner), Value::Array(items)) if !items.is_empty() => {
            if let FieldType::Object(item_schema) = inner.as_ref() {
                lines.push(format!("{label}:"));
                lines.extend(
                    items
                        .iter()
                        .map(|item| format!("  - {}", render_inline(item_schema, item))),
                );
            } else {
                let joined = items
                    .iter()
                    .map(|item| render_scalar(inner, item))
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("{label}: {joined}"));
            }
        }
        (field_type, value) => lines.push(format!("{label}: {}", render_scalar(field_type, value))),
    }
}

fn render_inline(schema: &OutputSchema, value: &Value) -> String {
    schema
        .fields()
        .iter()
        .map(|spec| {
            let field_value = value.get(spec.name()).unwrap_or(&Value::Null);
            format!(
                "{}: {}",
                spec.display_label(),
                render_scalar(spec.field_type(), field_value)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_scalar(field_type: &FieldType, value: &Value) -> String {
    match (field_type, value) {
        (_, Value::Null) => NOT_PROVIDED.to_string(),
        (_, Value::String(s)) => s.clone(),
        (_, Value::Bool(b)) => if *b { "yes" } else { "no" }.to_string(),
        (_, Value::Number(n)) => n.to_string(),
        (FieldType::Object(schema), object @ Value::Object(_)) => render_inline(schema, object),
        (FieldType::List(inner), Value::Array(items)) => {
            if items.is_empty() {
                EMPTY_LIST.to_string()
            } else {
                items
                    .iter()
                    .map(|item| format!("[{}]", render_scalar(inner, item)))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
        (_, other) => other.to_string(),
    }
}

/// `OrderInfo` -> `Order Info`
fn humanize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len() + 4);
    let mut prev_lower = false;
    for ch in title.chars() {
        if ch.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.push(if ch == '_' { ' ' } else { ch });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> OutputSchema {
        let item = OutputSchema::new("OrderItem")
            .field(FieldSpec::required("product_name", FieldType::String).label("Product"))
            .field(FieldSpec::required("quantity", FieldType::Integer).label("Qty"));
        OutputSchema::new("OrderInfo")
            .field(FieldSpec::required("order_id", FieldType::String).label("Order ID"))
            .field(FieldSpec::required("status", FieldType::String))
            .field(FieldSpec::required("total_amount", FieldType::Number))
            .field(FieldSpec::optional("gift", FieldType::Boolean))
            .field(FieldSpec::optional(
                "items",
                FieldType::list(FieldType::Object(item)),
            ))
            .field(FieldSpec::optional("notes", FieldType::list(FieldType::String)))
    }

    #[test]
    fn renders_fields_in_declaration_order() {
        let schema = schema();
        let result = schema
            .validate(&json!({
                "total_amount": 111.97,
                "status": "delivered",
                "order_id": "ORD-001",
                "gift": false,
            }))
            .expect("valid");
        let text = Presenter::new().present_structured(&schema, &result);
        assert_eq!(
            text,
            "Order ID: ORD-001\nStatus: delivered\nTotal amount: 111.97\nGift: no\nItems: not provided\nNotes: not provided"
        );
    }

    #[test]
    fn renders_object_lists_as_bullets() {
        let schema = schema();
        let result = schema
            .validate(&json!({
                "order_id": "ORD-2024-002",
                "status": "shipped",
                "total_amount": 88.96,
                "items": [
                    {"product_name": "Laptop Stand", "quantity": 1},
                    {"product_name": "USB-C Cable", "quantity": 3},
                ],
                "notes": [],
            }))
            .expect("valid");
        let text = Presenter::new()
            .with_structured_heading(true)
            .present_structured(&schema, &result);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Order Info");
        assert_eq!(lines[5], "Items:");
        assert_eq!(lines[6], "  - Product: Laptop Stand, Qty: 1");
        assert_eq!(lines[7], "  - Product: USB-C Cable, Qty: 3");
        assert_eq!(lines[8], "Notes: none");
    }

    #[test]
    fn text_is_relayed_verbatim_or_framed() {
        let plain = Presenter::new();
        assert_eq!(plain.present_text("  spaced\nreply "), "  spaced\nreply ");

        let framed = Presenter::new().with_text_frame("Our technician says:");
        assert_eq!(
            framed.present_text("Reset the headphones."),
            "Our technician says:\n\nReset the headphones."
        );
        assert_eq!(
            framed.present_text("Reset the headphones."),
            framed.present_text("Reset the headphones.")
        );
    }

    #[test]
    fn blank_frame_is_ignored() {
        let presenter = Presenter::new().with_text_frame("   ");
        assert_eq!(presenter.present_text("hi"), "hi");
    }

    #[test]
    fn humanizes_titles() {
        assert_eq!(humanize_title("RefundResult"), "Refund Result");
        assert_eq!(humanize_title("order_info"), "order info");
    }
}
