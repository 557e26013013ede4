//! Order book and the `order_lookup` handler

use super::schemas::{order_info_schema, NO_TRACKING};
use crate::router::schema::OutputSchema;
use crate::router::{CapabilityHandler, HandlerError, HandlerOutput, QueryContext, ResponseKind};
use crate::utils::{contains_phrase, normalize_for_match};
use async_trait::async_trait;
use chrono::NaiveDate;
use lazy_regex::lazy_regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

static RE_ORDER_ID: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)\bORD-(?:\d{4}-)?\d{3}\b");

/// `order_id` of the placeholder returned for unknown orders
pub const NOT_FOUND_ID: &str = "NOT_FOUND";

/// Handler name
pub const ORDER_LOOKUP: &str = "order_lookup";

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not yet shipped
    Pending,
    /// On its way
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled and refunded
    Cancelled,
    /// Placeholder for unknown orders
    NotFound,
}

impl OrderStatus {
    /// Lower-case label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Name of the product
    pub product_name: String,
    /// Quantity ordered
    pub quantity: u32,
    /// Price per unit
    pub price: f64,
}

impl OrderItem {
    fn new(product_name: &str, quantity: u32, price: f64) -> Self {
        Self {
            product_name: product_name.to_string(),
            quantity,
            price,
        }
    }
}

/// Order details as returned by `order_lookup`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    /// Unique order identifier
    pub order_id: String,
    /// Customer name
    pub customer_name: String,
    /// Order date (YYYY-MM-DD)
    pub order_date: String,
    /// Order status
    pub status: OrderStatus,
    /// Line items
    pub items: Vec<OrderItem>,
    /// Total order amount
    pub total_amount: f64,
    /// Shipping address
    pub shipping_address: String,
    /// Tracking number, `N/A` until shipped
    pub tracking_number: String,
}

impl OrderInfo {
    /// Placeholder for an order that does not exist
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            order_id: NOT_FOUND_ID.to_string(),
            customer_name: "Unknown".to_string(),
            order_date: "N/A".to_string(),
            status: OrderStatus::NotFound,
            items: Vec::new(),
            total_amount: 0.0,
            shipping_address: "N/A".to_string(),
            tracking_number: NO_TRACKING.to_string(),
        }
    }

    /// Whether this is the not-found placeholder
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.order_id == NOT_FOUND_ID
    }

    /// Parsed order date
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.order_date, "%Y-%m-%d").ok()
    }
}

/// Order id mentioned in a query, upper-cased (`ord-2024-001` -> `ORD-2024-001`)
#[must_use]
pub fn extract_order_id(query: &str) -> Option<String> {
    RE_ORDER_ID
        .find(query)
        .map(|m| m.as_str().to_ascii_uppercase())
}

/// In-memory order database
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: Vec<OrderInfo>,
}

impl OrderBook {
    /// Book holding the given orders
    #[must_use]
    pub const fn new(orders: Vec<OrderInfo>) -> Self {
        Self { orders }
    }

    /// The four demo orders
    #[must_use]
    pub fn sample() -> Self {
        Self::new(vec![
            OrderInfo {
                order_id: "ORD-2024-001".to_string(),
                customer_name: "John Doe".to_string(),
                order_date: "2024-09-15".to_string(),
                status: OrderStatus::Delivered,
                items: vec![
                    OrderItem::new("Wireless Headphones", 1, 79.99),
                    OrderItem::new("Phone Case", 2, 15.99),
                ],
                total_amount: 111.97,
                shipping_address: "123 Main St, San Francisco, CA 94102".to_string(),
                tracking_number: "TRK-1234567890".to_string(),
            },
            OrderInfo {
                order_id: "ORD-2024-002".to_string(),
                customer_name: "Jane Smith".to_string(),
                order_date: "2024-09-28".to_string(),
                status: OrderStatus::Shipped,
                items: vec![
                    OrderItem::new("Laptop Stand", 1, 49.99),
                    OrderItem::new("USB-C Cable", 3, 12.99),
                ],
                total_amount: 88.96,
                shipping_address: "456 Oak Ave, New York, NY 10001".to_string(),
                tracking_number: "TRK-0987654321".to_string(),
            },
            OrderInfo {
                order_id: "ORD-2024-003".to_string(),
                customer_name: "Bob Johnson".to_string(),
                order_date: "2024-10-01".to_string(),
                status: OrderStatus::Pending,
                items: vec![
                    OrderItem::new("Mechanical Keyboard", 1, 129.99),
                    OrderItem::new("Mouse Pad", 1, 19.99),
                ],
                total_amount: 149.98,
                shipping_address: "789 Pine Rd, Austin, TX 78701".to_string(),
                tracking_number: NO_TRACKING.to_string(),
            },
            OrderInfo {
                order_id: "ORD-2024-004".to_string(),
                customer_name: "Alice Williams".to_string(),
                order_date: "2024-09-20".to_string(),
                status: OrderStatus::Cancelled,
                items: vec![
                    OrderItem::new("Smartwatch", 1, 299.99),
                ],
                total_amount: 299.99,
                shipping_address: "321 Elm St, Seattle, WA 98101".to_string(),
                tracking_number: NO_TRACKING.to_string(),
            },
        ])
    }

    /// Find by order id. A short id (`ORD-001`) matches the first order with that sequence number.
    #[must_use]
    pub fn find_by_id(&self, order_id: &str) -> Option<&OrderInfo> {
        let wanted = order_id.trim().to_ascii_uppercase();
        if let Some(order) = self.orders.iter().find(|o| o.order_id == wanted) {
            return Some(order);
        }
        // Short form: ORD-NNN
        let (prefix, seq) = wanted.rsplit_once('-')?;
        if prefix.contains('-') {
            return None;
        }
        self.orders
            .iter()
            .find(|o| o.order_id.rsplit_once('-').is_some_and(|(_, s)| s == seq))
    }

    /// Find the first order whose customer's full name occurs in `text`
    #[must_use]
    pub fn find_by_customer(&self, text: &str) -> Option<&OrderInfo> {
        let normalized = normalize_for_match(text);
        self.orders
            .iter()
            .find(|o| contains_phrase(&normalized, &o.customer_name))
    }

    /// Resolve a free-form query: order id first, then customer name
    #[must_use]
    pub fn lookup(&self, query: &str) -> Option<&OrderInfo> {
        match extract_order_id(query) {
            Some(id) => self.find_by_id(&id),
            None => self.find_by_customer(query),
        }
    }

    /// Number of orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the book is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Structured handler that looks orders up in an [`OrderBook`]
pub struct OrderLookupHandler {
    book: Arc<OrderBook>,
    schema: OutputSchema,
}

impl OrderLookupHandler {
    /// Handler over a shared order book
    #[must_use]
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self {
            book,
            schema: order_info_schema(),
        }
    }
}

#[async_trait]
impl CapabilityHandler for OrderLookupHandler {
    fn name(&self) -> &str {
        ORDER_LOOKUP
    }

    fn kind(&self) -> ResponseKind {
        ResponseKind::Structured
    }

    fn description(&self) -> &str {
        "Looks up order information by order ID or customer name and returns structured data"
    }

    fn output_schema(&self) -> Option<&OutputSchema> {
        Some(&self.schema)
    }

    async fn invoke(
        &self,
        query: &str,
        _context: &QueryContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let order = self
            .book
            .lookup(query)
            .cloned()
            .unwrap_or_else(OrderInfo::not_found);
        debug!(order_id = %order.order_id, status = %order.status, "Order lookup finished");
        Ok(HandlerOutput::Structured(serde_json::to_value(order)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_long_and_short_ids() {
        assert_eq!(
            extract_order_id("Check order ord-2024-002 please").as_deref(),
            Some("ORD-2024-002")
        );
        assert_eq!(extract_order_id("Check order ORD-001").as_deref(), Some("ORD-001"));
        assert_eq!(extract_order_id("Check order ORD-20241"), None);
        assert_eq!(extract_order_id("no id here"), None);
    }

    #[test]
    fn finds_by_full_and_short_id() {
        let book = OrderBook::sample();
        assert_eq!(book.len(), 4);
        let order = book.find_by_id("ORD-2024-001").expect("order 1");
        assert_eq!(order.customer_name, "John Doe");
        assert_eq!(order.total_amount, 111.97);
        let short = book.find_by_id("ord-003").expect("order 3");
        assert_eq!(short.order_id, "ORD-2024-003");
        assert!(book.find_by_id("ORD-2024-999").is_none());
        assert!(book.find_by_id("ORD-999").is_none());
    }

    #[test]
    fn finds_by_customer_name() {
        let book = OrderBook::sample();
        let order = book
            .lookup("Can you check the order for jane smith?")
            .expect("Jane's order");
        assert_eq!(order.order_id, "ORD-2024-002");
        assert!(book.lookup("order for Jane").is_none());
    }

    #[tokio::test]
    async fn unknown_orders_return_placeholder() {
        let handler = OrderLookupHandler::new(Arc::new(OrderBook::sample()));
        let Ok(HandlerOutput::Structured(value)) =
            handler.invoke("Where is ORD-2023-777?", &QueryContext::new()).await
        else {
            panic!("expected structured output");
        };
        assert_eq!(value["order_id"], NOT_FOUND_ID);
        assert_eq!(value["status"], "not_found");
        assert_eq!(value["tracking_number"], "N/A");
        let validated = order_info_schema().validate(&value);
        assert!(validated.is_ok());
    }

    #[tokio::test]
    async fn handler_output_matches_schema() {
        let handler = OrderLookupHandler::new(Arc::new(OrderBook::sample()));
        let Ok(HandlerOutput::Structured(value)) =
            handler.invoke("Status of ORD-2024-001", &QueryContext::new()).await
        else {
            panic!("expected structured output");
        };
        let result = order_info_schema().validate(&value).expect("valid order");
        assert_eq!(result.get("status"), Some(&serde_json::json!("delivered")));
        assert_eq!(result.get("items").and_then(|v| v.as_array()).map(Vec::len), Some(2));
    }
}
