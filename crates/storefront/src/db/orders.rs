//! Order repository and the statements checkout runs inside transactions.
//!
//! Status changes that release stock go through a guarded `UPDATE ... WHERE
//! status = ANY(...)`, so whichever of cancel, payment failure or expiry
//! wins the row is the only one that puts stock back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{
    CurrencyCode, OrderId, OrderStatus, PaymentStatus, Pincode, ProductId, UserId,
};

use super::RepositoryError;
use super::carts::LockedLine;
use crate::models::Page;
use crate::models::address::AddressDetails;
use crate::models::order::{
    AdminOrderQuery, AdminOrderSummary, NewOrder, Order, OrderItem, OrderSummary, StatusChange,
};

const ORDER_COLUMNS: &str = "id, user_id, status, payment_status, subtotal, shipping_fee, total, \
    currency, ship_name, ship_phone, ship_line1, ship_line2, ship_city, ship_state, ship_pincode, \
    gateway_order_id, gateway_payment_id, tracking_number, reserved_until, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    subtotal: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    currency: String,
    ship_name: String,
    ship_phone: String,
    ship_line1: String,
    ship_line2: Option<String>,
    ship_city: String,
    ship_state: String,
    ship_pincode: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    tracking_number: Option<String>,
    reserved_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency in database: {e}"))
        })?;
        let pincode = Pincode::parse(&row.ship_pincode).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid pincode in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            payment_status: row.payment_status,
            subtotal: row.subtotal,
            shipping_fee: row.shipping_fee,
            total: row.total,
            currency,
            shipping_address: AddressDetails {
                full_name: row.ship_name,
                phone: row.ship_phone,
                line1: row.ship_line1,
                line2: row.ship_line2,
                city: row.ship_city,
                state: row.ship_state,
                pincode,
            },
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            tracking_number: row.tracking_number,
            reserved_until: row.reserved_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_names(statuses: &[OrderStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get any order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM bazaar.orders WHERE id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    /// Get an order only if it belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql =
            format!("SELECT {ORDER_COLUMNS} FROM bazaar.orders WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    /// Find the order created for a gateway order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql =
            format!("SELECT {ORDER_COLUMNS} FROM bazaar.orders WHERE gateway_order_id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(gateway_order_id)
            .fetch_optional(self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    /// Line items of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT product_id, product_name, size, unit_price, quantity
            FROM bazaar.order_items WHERE order_id = $1
            ORDER BY product_name, size
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Status timeline, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        let history = sqlx::query_as::<_, StatusChange>(
            r"
            SELECT status, note, created_at FROM bazaar.order_status_history
            WHERE order_id = $1 ORDER BY created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(history)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<OrderSummary>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bazaar.orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        let orders = sqlx::query_as::<_, OrderSummary>(
            r"
            SELECT o.id, o.status, o.payment_status, o.total,
                   COALESCE((SELECT SUM(quantity) FROM bazaar.order_items oi
                             WHERE oi.order_id = o.id), 0)::bigint AS item_count,
                   o.created_at
            FROM bazaar.orders o
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((orders, total))
    }

    /// All orders for the admin, filtered by status and payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_admin(
        &self,
        query: &AdminOrderQuery,
        page: Page,
    ) -> Result<(Vec<AdminOrderSummary>, i64), RepositoryError> {
        let status = query.status.map(OrderStatus::as_str);
        let payment_status = query.payment_status.map(|p| p.to_string());

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM bazaar.orders
            WHERE ($1::text IS NULL OR status::text = $1)
              AND ($2::text IS NULL OR payment_status::text = $2)
            ",
        )
        .bind(status)
        .bind(payment_status.as_deref())
        .fetch_one(self.pool)
        .await?;

        let orders = sqlx::query_as::<_, AdminOrderSummary>(
            r"
            SELECT o.id, o.user_id, u.email AS customer_email, o.status, o.payment_status,
                   o.total,
                   COALESCE((SELECT SUM(quantity) FROM bazaar.order_items oi
                             WHERE oi.order_id = o.id), 0)::bigint AS item_count,
                   o.tracking_number, o.created_at
            FROM bazaar.orders o
            JOIN bazaar.users u ON u.id = o.user_id
            WHERE ($1::text IS NULL OR o.status::text = $1)
              AND ($2::text IS NULL OR o.payment_status::text = $2)
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(status)
        .bind(payment_status.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((orders, total))
    }

    /// Attach the gateway order id after the gateway call succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_gateway_order_id(
        &self,
        id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE bazaar.orders SET gateway_order_id = $2 WHERE id = $1")
            .bind(id)
            .bind(gateway_order_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Set the courier tracking number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_tracking(
        &self,
        id: OrderId,
        tracking_number: &str,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE bazaar.orders SET tracking_number = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(tracking_number)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
            .and_then(Order::try_from)
    }

    /// Pending unpaid orders whose reservation lapsed before `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, OrderId>(
            r"
            SELECT id FROM bazaar.orders
            WHERE status = 'pending' AND payment_status = 'pending' AND reserved_until < $1
            ORDER BY reserved_until
            ",
        )
        .bind(now)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Record a gateway event id. Returns `false` if it was seen before.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_payment_event(
        &self,
        event_id: &str,
        event_type: &str,
        order_id: Option<OrderId>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO bazaar.payment_events (event_id, event_type, order_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(order_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Forget a recorded event so a redelivery is processed again.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn forget_payment_event(&self, event_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM bazaar.payment_events WHERE event_id = $1")
            .bind(event_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Whether the user has a paid or delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_purchased(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let purchased = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM bazaar.orders o
                JOIN bazaar.order_items oi ON oi.order_id = o.id
                WHERE o.user_id = $1 AND oi.product_id = $2
                  AND (o.payment_status = 'paid' OR o.status = 'delivered')
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(purchased)
    }
}

// =============================================================================
// Transaction statements
// =============================================================================

/// Take `quantity` units of a size out of stock.
///
/// Returns `false`, leaving stock untouched, when fewer units are available.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn reserve_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    size: &str,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE bazaar.product_stock SET quantity = quantity - $3
        WHERE product_id = $1 AND size = $2 AND quantity >= $3
        ",
    )
    .bind(product_id)
    .bind(size)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Units currently in stock for a size (0 when the size is gone).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn available_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    size: &str,
) -> Result<i32, RepositoryError> {
    let quantity = sqlx::query_scalar::<_, i32>(
        "SELECT quantity FROM bazaar.product_stock WHERE product_id = $1 AND size = $2",
    )
    .bind(product_id)
    .bind(size)
    .fetch_optional(conn)
    .await?;
    Ok(quantity.unwrap_or(0))
}

/// Put an order's items back into stock.
///
/// Sizes removed since placement are recreated. Returns the products touched.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn release_stock(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<ProductId>, RepositoryError> {
    let products = sqlx::query_scalar::<_, ProductId>(
        r"
        INSERT INTO bazaar.product_stock (product_id, size, quantity)
        SELECT product_id, size, quantity FROM bazaar.order_items WHERE order_id = $1
        ON CONFLICT (product_id, size)
            DO UPDATE SET quantity = bazaar.product_stock.quantity + EXCLUDED.quantity
        RETURNING product_id
        ",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(products)
}

/// Insert a pending order and return its id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_order(
    conn: &mut PgConnection,
    order: &NewOrder,
) -> Result<OrderId, RepositoryError> {
    let address = &order.shipping_address;
    let id = sqlx::query_scalar::<_, OrderId>(
        r"
        INSERT INTO bazaar.orders
            (user_id, subtotal, shipping_fee, total, currency,
             ship_name, ship_phone, ship_line1, ship_line2, ship_city, ship_state, ship_pincode,
             reserved_until)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING id
        ",
    )
    .bind(order.user_id)
    .bind(order.subtotal)
    .bind(order.shipping_fee)
    .bind(order.total)
    .bind(order.currency.code())
    .bind(&address.full_name)
    .bind(&address.phone)
    .bind(&address.line1)
    .bind(address.line2.as_deref())
    .bind(&address.city)
    .bind(&address.state)
    .bind(address.pincode.as_str())
    .bind(order.reserved_until)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Snapshot cart lines as order items.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn insert_order_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    lines: &[LockedLine],
) -> Result<(), RepositoryError> {
    for line in lines {
        sqlx::query(
            r"
            INSERT INTO bazaar.order_items
                (order_id, product_id, product_name, size, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.size)
        .bind(line.price)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Append to an order's status timeline.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn record_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
    note: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO bazaar.order_status_history (order_id, status, note) VALUES ($1, $2, $3)",
    )
    .bind(order_id)
    .bind(status)
    .bind(note)
    .execute(conn)
    .await?;
    Ok(())
}

/// Lock an order row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM bazaar.orders WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(Order::try_from)
        .transpose()
}

/// Mark a pending order paid and confirmed.
///
/// Returns `None` when the order is not pending payment, which makes the
/// paid transition happen at most once.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_paid(
    conn: &mut PgConnection,
    id: OrderId,
    gateway_payment_id: &str,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!(
        r"
        UPDATE bazaar.orders
        SET payment_status = 'paid', status = 'confirmed', gateway_payment_id = $2
        WHERE id = $1 AND payment_status = 'pending' AND status = 'pending'
        RETURNING {ORDER_COLUMNS}
        "
    );
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .bind(gateway_payment_id)
        .fetch_optional(conn)
        .await?
        .map(Order::try_from)
        .transpose()
}

/// Cancel an order if its status is one of `from`.
///
/// `payment_status`, when given, is written in the same statement.
/// Returns `None` when the guard did not match.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn cancel(
    conn: &mut PgConnection,
    id: OrderId,
    from: &[OrderStatus],
    payment_status: Option<PaymentStatus>,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!(
        r"
        UPDATE bazaar.orders
        SET status = 'cancelled', payment_status = COALESCE($3, payment_status)
        WHERE id = $1 AND status::text = ANY($2)
        RETURNING {ORDER_COLUMNS}
        "
    );
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .bind(status_names(from))
        .bind(payment_status)
        .fetch_optional(conn)
        .await?
        .map(Order::try_from)
        .transpose()
}

/// Move an order from `from` to `to`. Returns `None` if the status changed
/// underneath the caller.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn transition(
    conn: &mut PgConnection,
    id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!(
        "UPDATE bazaar.orders SET status = $3 WHERE id = $1 AND status = $2 RETURNING {ORDER_COLUMNS}"
    );
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(conn)
        .await?
        .map(Order::try_from)
        .transpose()
}

/// Record a payment that arrived for an order no longer awaiting one.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_payment_status(
    conn: &mut PgConnection,
    id: OrderId,
    payment_status: PaymentStatus,
    gateway_payment_id: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE bazaar.orders
        SET payment_status = $2, gateway_payment_id = COALESCE($3, gateway_payment_id)
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(payment_status)
    .bind(gateway_payment_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(
            status_names(&[OrderStatus::Pending, OrderStatus::Confirmed]),
            vec!["pending", "confirmed"]
        );
    }
}
