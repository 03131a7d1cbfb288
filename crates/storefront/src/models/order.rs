//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CurrencyCode, OrderId, OrderStatus, PaymentStatus, ProductId, UserId};

use super::address::AddressDetails;

/// An order header.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
    /// Address snapshot taken at placement.
    pub shipping_address: AddressDetails,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub tracking_number: Option<String>,
    /// Stock is held until this time while payment is pending.
    pub reserved_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a purchased line.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub size: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// One entry in an order's status timeline.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Order history list entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total: Decimal,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Admin order list entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminOrderSummary {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total: Decimal,
    pub item_count: i64,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full order view.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<StatusChange>,
}

/// Values for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub shipping_address: AddressDetails,
    pub reserved_until: DateTime<Utc>,
}

/// Admin order list filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `PUT /api/admin/orders/{id}/status` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub note: Option<String>,
    /// Required when moving to `shipped` unless already set.
    pub tracking_number: Option<String>,
}

/// `PUT /api/admin/orders/{id}/tracking` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingUpdate {
    pub tracking_number: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_line_total() {
        let item = OrderItem {
            product_id: ProductId::new(3),
            product_name: "Block Print Kurta".to_string(),
            size: "L".to_string(),
            unit_price: Decimal::from_str("1299.00").unwrap_or_default(),
            quantity: 2,
        };
        assert_eq!(item.line_total().to_string(), "2598.00");
    }
}
