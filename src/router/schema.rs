//! Output schemas for structured handlers.
//!
//! A schema is an ordered list of typed fields. Validation is strict: values
//! of the wrong JSON type are rejected rather than converted, missing required
//! fields are reported, and declared defaults fill in absent optional fields.
//! A validated result keeps its fields in declaration order.

use crate::utils::strip_code_fences;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Type of a schema field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// JSON string
    String,
    /// JSON number without fractional part
    Integer,
    /// Any JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON array whose elements all have the inner type
    List(Box<FieldType>),
    /// Nested object described by its own schema
    Object(OutputSchema),
}

impl FieldType {
    /// List of `inner`
    #[must_use]
    pub fn list(inner: Self) -> Self {
        Self::List(Box::new(inner))
    }

    /// JSON-schema type name
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::List(_) => "array",
            Self::Object(_) => "object",
        }
    }

    fn describe(&self) -> Value {
        match self {
            Self::List(inner) => json!({ "type": "array", "items": inner.describe() }),
            Self::Object(schema) => schema.describe(),
            scalar => json!({ "type": scalar.type_name() }),
        }
    }
}

/// Whether a field must be present
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// Missing or null is a violation
    Required,
    /// Missing or null is kept as null
    Optional,
    /// Missing or null is replaced by the value
    Default(Value),
}

/// One declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    label: Option<String>,
    description: String,
    requirement: Requirement,
}

impl FieldSpec {
    fn new(name: impl Into<String>, field_type: FieldType, requirement: Requirement) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: None,
            description: String::new(),
            requirement,
        }
    }

    /// Field that must be present
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type, Requirement::Required)
    }

    /// Field that may be absent
    #[must_use]
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type, Requirement::Optional)
    }

    /// Field that falls back to `default` when absent
    #[must_use]
    pub fn with_default(name: impl Into<String>, field_type: FieldType, default: Value) -> Self {
        Self::new(name, field_type, Requirement::Default(default))
    }

    /// Human-readable label used by the presenter
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Description included in LLM output instructions
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Field name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field type
    #[must_use]
    pub const fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Requirement
    #[must_use]
    pub const fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Explicit label, or the name in sentence case (`order_id` -> `Order id`)
    #[must_use]
    pub fn display_label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let words = self.name.replace('_', " ");
        let mut chars = words.trim().chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars).collect()
        })
    }
}

/// Ordered set of fields a structured result must conform to
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputSchema {
    title: String,
    fields: Vec<FieldSpec>,
    deny_unknown_fields: bool,
}

impl OutputSchema {
    /// Empty schema with a title (e.g. `OrderInfo`)
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
            deny_unknown_fields: false,
        }
    }

    /// Append a field; declaration order is presentation order
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Treat undeclared fields as violations instead of dropping them
    #[must_use]
    pub const fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown_fields = true;
        self
    }

    /// Schema title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Declared fields in order
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Check the schema itself: non-empty, unique field names, defaults of the right type.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err(format!("schema '{}' declares no fields", self.title));
        }
        let mut seen = HashSet::new();
        for spec in &self.fields {
            if spec.name.trim().is_empty() {
                return Err(format!("schema '{}' has a field without a name", self.title));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(format!(
                    "schema '{}' declares field '{}' twice",
                    self.title, spec.name
                ));
            }
            if let Requirement::Default(default) = &spec.requirement {
                let mut violations = Vec::new();
                check_value(&spec.field_type, default, &spec.name, &mut violations);
                if !violations.is_empty() {
                    return Err(format!(
                        "schema '{}' field '{}' has a default of the wrong type",
                        self.title, spec.name
                    ));
                }
            }
            let nested = match &spec.field_type {
                FieldType::Object(schema) => Some(schema),
                FieldType::List(inner) => match inner.as_ref() {
                    FieldType::Object(schema) => Some(schema),
                    _ => None,
                },
                _ => None,
            };
            if let Some(schema) = nested {
                schema.check()?;
            }
        }
        Ok(())
    }

    /// Parse raw handler text as JSON (tolerating a code fence) and validate it.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::Parse` for invalid JSON, otherwise see [`Self::validate`].
    pub fn parse(&self, raw: &str) -> Result<StructuredResult, SchemaValidationError> {
        let body = strip_code_fences(raw);
        if body.is_empty() {
            return Err(SchemaValidationError::Parse {
                schema: self.title.clone(),
                message: "empty output".to_string(),
            });
        }
        let value: Value =
            serde_json::from_str(body).map_err(|e| SchemaValidationError::Parse {
                schema: self.title.clone(),
                message: e.to_string(),
            })?;
        self.validate(&value)
    }

    /// Validate a JSON value against the schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::Violations` listing every problem found.
    pub fn validate(&self, value: &Value) -> Result<StructuredResult, SchemaValidationError> {
        let mut violations = Vec::new();
        let fields = validate_object(self, value, "", &mut violations);
        match fields {
            Some(fields) if violations.is_empty() => Ok(StructuredResult { fields }),
            _ => Err(SchemaValidationError::Violations {
                schema: self.title.clone(),
                violations,
            }),
        }
    }

    /// JSON-schema description, used in output instructions for LLM sub-agents
    #[must_use]
    pub fn describe(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.fields {
            let mut property = spec.field_type.describe();
            if let Value::Object(obj) = &mut property {
                if !spec.description.is_empty() {
                    obj.insert("description".to_string(), json!(spec.description));
                }
                if let Requirement::Default(default) = &spec.requirement {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(spec.name.clone(), property);
            if spec.requirement == Requirement::Required {
                required.push(json!(spec.name));
            }
        }
        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": !self.deny_unknown_fields,
        })
    }
}

/// Schema-validated field mapping in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResult {
    fields: Vec<(String, Value)>,
}

impl StructuredResult {
    /// Value of a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Fields in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert to a JSON object
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.iter().cloned().collect())
    }
}

impl Serialize for StructuredResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One way a value failed its schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Required field absent or null
    Missing {
        /// JSON path of the field
        path: String,
    },
    /// Value has the wrong JSON type
    TypeMismatch {
        /// JSON path of the value (`$` for the root)
        path: String,
        /// Declared type
        expected: &'static str,
        /// Actual JSON type
        found: &'static str,
    },
    /// Field not declared by a schema that denies unknown fields
    UnknownField {
        /// JSON path of the field
        path: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path } => write!(f, "missing required field '{path}'"),
            Self::TypeMismatch {
                path,
                expected,
                found,
            } => write!(f, "'{path}' must be {expected}, found {found}"),
            Self::UnknownField { path } => write!(f, "unknown field '{path}'"),
        }
    }
}

/// Structured handler output that does not satisfy its schema
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaValidationError {
    /// Output is not JSON at all
    #[error("{schema}: output is not valid JSON: {message}")]
    Parse {
        /// Schema title
        schema: String,
        /// Parser message
        message: String,
    },
    /// Output is JSON but violates the schema
    #[error("{schema}: {}", join_violations(.violations))]
    Violations {
        /// Schema title
        schema: String,
        /// Every violation found
        violations: Vec<Violation>,
    },
}

impl SchemaValidationError {
    /// Violations found (empty for parse errors)
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Parse { .. } => &[],
            Self::Violations { violations, .. } => violations,
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// JSON type name of a value
#[must_use]
pub const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

fn validate_object(
    schema: &OutputSchema,
    value: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<Vec<(String, Value)>> {
    let Value::Object(obj) = value else {
        violations.push(Violation::TypeMismatch {
            path: if path.is_empty() { "$".to_string() } else { path.to_string() },
            expected: "object",
            found: json_type_name(value),
        });
        return None;
    };

    let mut fields = Vec::with_capacity(schema.fields.len());
    for spec in &schema.fields {
        let field_path = join_path(path, &spec.name);
        let present = obj.get(&spec.name).filter(|v| !v.is_null());
        match (present, &spec.requirement) {
            (Some(v), _) => {
                if let Some(normalized) = check_value(&spec.field_type, v, &field_path, violations)
                {
                    fields.push((spec.name.clone(), normalized));
                }
            }
            (None, Requirement::Required) => {
                violations.push(Violation::Missing { path: field_path });
            }
            (None, Requirement::Optional) => fields.push((spec.name.clone(), Value::Null)),
            (None, Requirement::Default(default)) => {
                fields.push((spec.name.clone(), default.clone()));
            }
        }
    }

    if schema.deny_unknown_fields {
        let declared: HashSet<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        for key in obj.keys().filter(|key| !declared.contains(key.as_str())) {
            violations.push(Violation::UnknownField {
                path: join_path(path, key),
            });
        }
    }

    Some(fields)
}

fn check_value(
    field_type: &FieldType,
    value: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<Value> {
    let ok = match field_type {
        FieldType::String => value.is_string(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::List(inner) => {
            let Value::Array(items) = value else {
                violations.push(mismatch(field_type, value, path));
                return None;
            };
            let before = violations.len();
            let normalized: Vec<Value> = items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| check_value(inner, item, &format!("{path}[{i}]"), violations))
                .collect();
            return (violations.len() == before).then_some(Value::Array(normalized));
        }
        FieldType::Object(schema) => {
            let before = violations.len();
            let fields = validate_object(schema, value, path, violations)?;
            return (violations.len() == before)
                .then(|| Value::Object(fields.into_iter().collect()));
        }
    };

    if ok {
        Some(value.clone())
    } else {
        violations.push(mismatch(field_type, value, path));
        None
    }
}

fn mismatch(field_type: &FieldType, value: &Value, path: &str) -> Violation {
    Violation::TypeMismatch {
        path: path.to_string(),
        expected: field_type.type_name(),
        found: json_type_name(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_schema() -> OutputSchema {
        let item = OutputSchema::new("OrderItem")
            .field(FieldSpec::required("product_name", FieldType::String))
            .field(FieldSpec::required("quantity", FieldType::Integer));
        OutputSchema::new("OrderInfo")
            .field(FieldSpec::required("order_id", FieldType::String).label("Order ID"))
            .field(FieldSpec::required("status", FieldType::String))
            .field(FieldSpec::required("total_amount", FieldType::Number))
            .field(FieldSpec::optional(
                "items",
                FieldType::list(FieldType::Object(item)),
            ))
            .field(FieldSpec::with_default(
                "tracking_number",
                FieldType::String,
                json!("N/A"),
            ))
    }

    #[test]
    fn accepts_valid_result_in_declaration_order() {
        let value = json!({
            "total_amount": 111.97,
            "status": "delivered",
            "order_id": "ORD-001",
        });
        let result = order_schema().validate(&value).expect("valid order");
        let names: Vec<&str> = result.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["order_id", "status", "total_amount", "items", "tracking_number"]
        );
        assert_eq!(result.get("tracking_number"), Some(&json!("N/A")));
        assert_eq!(result.get("items"), Some(&Value::Null));
    }

    #[test]
    fn reports_every_missing_field() {
        let value = json!({ "order_id": "ORD-001" });
        let Err(err) = order_schema().validate(&value) else {
            panic!("missing fields must be rejected");
        };
        assert_eq!(
            err.violations(),
            &[
                Violation::Missing {
                    path: "status".to_string()
                },
                Violation::Missing {
                    path: "total_amount".to_string()
                },
            ]
        );
        assert!(err.to_string().starts_with("OrderInfo: missing required field"));
    }

    #[test]
    fn rejects_wrong_types_without_coercion() {
        let value = json!({
            "order_id": 1,
            "status": "delivered",
            "total_amount": "111.97",
        });
        let Err(err) = order_schema().validate(&value) else {
            panic!("wrong types must be rejected");
        };
        assert_eq!(err.violations().len(), 2);
        assert!(err.violations().contains(&Violation::TypeMismatch {
            path: "total_amount".to_string(),
            expected: "number",
            found: "string",
        }));
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        let value = json!({
            "order_id": "ORD-1",
            "status": "shipped",
            "total_amount": 10,
            "items": [{"product_name": "Mouse Pad", "quantity": 1.5}],
        });
        let Err(err) = order_schema().validate(&value) else {
            panic!("fractional quantity must be rejected");
        };
        assert_eq!(
            err.violations(),
            &[Violation::TypeMismatch {
                path: "items[0].quantity".to_string(),
                expected: "integer",
                found: "number",
            }]
        );
    }

    #[test]
    fn nested_objects_serialize_in_declaration_order() {
        let item = OutputSchema::new("OrderItem")
            .field(FieldSpec::required("product_name", FieldType::String))
            .field(FieldSpec::required("quantity", FieldType::Integer))
            .field(FieldSpec::required("price", FieldType::Number));
        let schema = OutputSchema::new("Basket")
            .field(FieldSpec::required("items", FieldType::list(FieldType::Object(item))));

        let result = schema
            .validate(&json!({"items": [{"price": 2.0, "quantity": 1, "product_name": "A"}]}))
            .expect("valid basket");
        assert_eq!(
            serde_json::to_string(&result).expect("serializable"),
            r#"{"items":[{"product_name":"A","quantity":1,"price":2.0}]}"#
        );
    }

    #[test]
    fn rejects_non_object_root() {
        let Err(err) = order_schema().validate(&json!(["ORD-001"])) else {
            panic!("arrays are not objects");
        };
        assert_eq!(
            err.violations(),
            &[Violation::TypeMismatch {
                path: "$".to_string(),
                expected: "object",
                found: "array",
            }]
        );
    }

    #[test]
    fn unknown_fields_dropped_or_denied() {
        let value = json!({
            "order_id": "ORD-1",
            "status": "pending",
            "total_amount": 5,
            "coupon": "SAVE10",
        });
        let result = order_schema().validate(&value).expect("extras are dropped");
        assert!(result.get("coupon").is_none());

        let strict = order_schema().deny_unknown_fields();
        let Err(err) = strict.validate(&value) else {
            panic!("strict schema must reject extras");
        };
        assert_eq!(
            err.violations(),
            &[Violation::UnknownField {
                path: "coupon".to_string()
            }]
        );
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"order_id\":\"ORD-1\",\"status\":\"shipped\",\"total_amount\":1}\n```";
        assert!(order_schema().parse(raw).is_ok());
    }

    #[test]
    fn parse_errors_are_reported() {
        let Err(err) = order_schema().parse("Your order has shipped!") else {
            panic!("prose is not JSON");
        };
        assert!(matches!(err, SchemaValidationError::Parse { .. }));
        assert!(matches!(
            order_schema().parse("   "),
            Err(SchemaValidationError::Parse { .. })
        ));
    }

    #[test]
    fn check_rejects_duplicate_and_bad_defaults() {
        assert!(order_schema().check().is_ok());
        let dup = OutputSchema::new("Dup")
            .field(FieldSpec::required("a", FieldType::String))
            .field(FieldSpec::required("a", FieldType::Integer));
        assert!(dup.check().is_err());
        let bad_default = OutputSchema::new("Bad").field(FieldSpec::with_default(
            "n",
            FieldType::Integer,
            json!("zero"),
        ));
        assert!(bad_default.check().is_err());
        assert!(OutputSchema::new("Empty").check().is_err());
    }

    #[test]
    fn display_label_defaults_to_sentence_case() {
        assert_eq!(
            FieldSpec::required("total_amount", FieldType::Number).display_label(),
            "Total amount"
        );
        assert_eq!(
            FieldSpec::required("order_id", FieldType::String)
                .label("Order ID")
                .display_label(),
            "Order ID"
        );
    }

    #[test]
    fn describe_lists_required_fields() {
        let described = order_schema().describe();
        assert_eq!(described["type"], "object");
        assert_eq!(
            described["required"],
            json!(["order_id", "status", "total_amount"])
        );
        assert_eq!(described["properties"]["items"]["type"], "array");
        assert_eq!(described["properties"]["tracking_number"]["default"], "N/A");
    }

    #[test]
    fn serializes_in_declaration_order() {
        let value = json!({"total_amount": 1, "status": "s", "order_id": "o"});
        let result = order_schema().validate(&value).expect("valid");
        let text = serde_json::to_string(&result).expect("serializable");
        assert!(text.starts_with("{\"order_id\":\"o\",\"status\":\"s\",\"total_amount\":1"));
    }
}
