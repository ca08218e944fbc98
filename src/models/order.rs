use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{order_items, orders};

/// Lifecycle of an order's payment, stored as an uppercase varchar.
///
/// `PENDING -> PROCESSING_PAYMENT -> PAID | FAILED -> COMPLETED`; the webhook
/// may also set `PAID` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    ProcessingPayment,
    Paid,
    Failed,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::ProcessingPayment => "PROCESSING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSING_PAYMENT" => Some(OrderStatus::ProcessingPayment),
            "PAID" => Some(OrderStatus::Paid),
            "FAILED" => Some(OrderStatus::Failed),
            "COMPLETED" => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    /// Maps the payment provider's status vocabulary onto ours. Anything
    /// unrecognized is treated as a failure.
    pub fn from_provider(provider_status: &str) -> OrderStatus {
        match provider_status {
            "paid" => OrderStatus::Paid,
            "failed" | "cancelled" => OrderStatus::Failed,
            "new" => OrderStatus::Pending,
            "processing" => OrderStatus::ProcessingPayment,
            _ => OrderStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub total: BigDecimal,
    pub delivery_address: String,
    pub delivery_time: DateTime<Utc>,
    pub contact_phone: String,
    pub provider_invoice_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub total: BigDecimal,
    pub delivery_address: String,
    pub delivery_time: DateTime<Utc>,
    pub contact_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(Order))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn provider_statuses_map_to_local_enum() {
        let cases = [
            ("paid", OrderStatus::Paid),
            ("failed", OrderStatus::Failed),
            ("cancelled", OrderStatus::Failed),
            ("new", OrderStatus::Pending),
            ("processing", OrderStatus::ProcessingPayment),
            ("refunded", OrderStatus::Failed),
            ("", OrderStatus::Failed),
        ];
        for (provider, expected) in cases {
            assert_eq!(OrderStatus::from_provider(provider), expected, "{provider}");
        }
    }

    #[test]
    fn as_str_and_parse_are_inverse() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::ProcessingPayment,
            OrderStatus::Paid,
            OrderStatus::Failed,
            OrderStatus::Completed,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert_eq!(OrderStatus::parse("SHIPPED"), None);
    }
}
