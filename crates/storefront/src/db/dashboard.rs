//! Aggregates for the admin dashboard.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use bazaar_core::{OrderStatus, ProductId};

use super::RepositoryError;

/// Stock rows at or below this quantity are reported as low.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Number of orders in one status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// A size running low on stock.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockRow {
    pub product_id: ProductId,
    pub name: String,
    pub size: String,
    pub quantity: i32,
}

/// Dashboard figures.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Sum of order totals with payment status `paid`.
    pub revenue: Decimal,
    pub orders_by_status: Vec<StatusCount>,
    pub user_count: i64,
    pub orders_last_30_days: i64,
    pub low_stock: Vec<LowStockRow>,
}

/// Read-only dashboard queries.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Collect all dashboard figures as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, RepositoryError> {
        let revenue: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0) FROM bazaar.orders WHERE payment_status = 'paid'",
        )
        .fetch_one(self.pool)
        .await?;

        let orders_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM bazaar.orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bazaar.users")
            .fetch_one(self.pool)
            .await?;

        let orders_last_30_days: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bazaar.orders WHERE created_at >= $1 - INTERVAL '30 days'",
        )
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        let low_stock = sqlx::query_as::<_, LowStockRow>(
            r"
            SELECT s.product_id, p.name, s.size, s.quantity
            FROM bazaar.product_stock s
            JOIN bazaar.products p ON p.id = s.product_id
            WHERE NOT p.is_archived AND s.quantity <= $1
            ORDER BY s.quantity, p.name, s.size
            ",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(self.pool)
        .await?;

        Ok(DashboardStats {
            revenue,
            orders_by_status,
            user_count,
            orders_last_30_days,
            low_stock,
        })
    }
}
