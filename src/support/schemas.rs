//! Output schemas of the structured support handlers

use crate::router::schema::{FieldSpec, FieldType, OutputSchema};
use serde_json::json;

/// Placeholder used when an order has no tracking number
pub const NO_TRACKING: &str = "N/A";

/// One line item of an order
#[must_use]
pub fn order_item_schema() -> OutputSchema {
    OutputSchema::new("OrderItem")
        .field(
            FieldSpec::required("product_name", FieldType::String)
                .label("Product")
                .description("Name of the product"),
        )
        .field(
            FieldSpec::required("quantity", FieldType::Integer)
                .label("Quantity")
                .description("Quantity ordered"),
        )
        .field(
            FieldSpec::required("price", FieldType::Number)
                .label("Price")
                .description("Price per unit"),
        )
}

/// Result of `order_lookup`
#[must_use]
pub fn order_info_schema() -> OutputSchema {
    OutputSchema::new("OrderInfo")
        .field(
            FieldSpec::required("order_id", FieldType::String)
                .label("Order ID")
                .description("Unique order identifier"),
        )
        .field(
            FieldSpec::required("customer_name", FieldType::String)
                .label("Customer")
                .description("Customer name"),
        )
        .field(
            FieldSpec::required("order_date", FieldType::String)
                .label("Order date")
                .description("Order date (YYYY-MM-DD)"),
        )
        .field(
            FieldSpec::required("status", FieldType::String)
                .label("Status")
                .description("Order status (pending/shipped/delivered/cancelled)"),
        )
        .field(
            FieldSpec::required("items", FieldType::list(FieldType::Object(order_item_schema())))
                .label("Items")
                .description("List of items in the order"),
        )
        .field(
            FieldSpec::required("total_amount", FieldType::Number)
                .label("Total amount")
                .description("Total order amount"),
        )
        .field(
            FieldSpec::required("shipping_address", FieldType::String)
                .label("Shipping address")
                .description("Shipping address"),
        )
        .field(
            FieldSpec::with_default("tracking_number", FieldType::String, json!(NO_TRACKING))
                .label("Tracking number")
                .description("Tracking number if shipped"),
        )
}

/// Result of `refund_processor`
#[must_use]
pub fn refund_result_schema() -> OutputSchema {
    OutputSchema::new("RefundResult")
        .field(
            FieldSpec::required("refund_id", FieldType::String)
                .label("Refund ID")
                .description("Unique refund identifier"),
        )
        .field(
            FieldSpec::required("order_id", FieldType::String)
                .label("Order ID")
                .description("Associated order ID"),
        )
        .field(
            FieldSpec::required("status", FieldType::String)
                .label("Status")
                .description("Refund status (approved/rejected/pending)"),
        )
        .field(
            FieldSpec::required("refund_amount", FieldType::Number)
                .label("Refund amount")
                .description("Refund amount"),
        )
        .field(
            FieldSpec::required("reason", FieldType::String)
                .label("Reason")
                .description("Reason for refund decision"),
        )
        .field(
            FieldSpec::required("processing_time", FieldType::String)
                .label("Processing time")
                .description("Expected processing time"),
        )
        .field(
            FieldSpec::required("refund_method", FieldType::String)
                .label("Refund method")
                .description("Refund method (original payment/store credit)"),
        )
}
