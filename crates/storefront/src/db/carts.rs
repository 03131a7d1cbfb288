//! Cart repository.
//!
//! Each user has at most one cart, created lazily on first write.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bazaar_core::{CartId, ProductId, UserId};

use super::RepositoryError;
use super::products::parse_slug;
use crate::models::cart::CartLine;

#[derive(sqlx::FromRow)]
struct LineRow {
    product_id: ProductId,
    slug: String,
    name: String,
    image: Option<String>,
    size: String,
    quantity: i32,
    price: Decimal,
    available: i32,
    is_archived: bool,
}

/// A cart line locked for checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub size: String,
    pub quantity: i32,
    pub price: Decimal,
    pub is_archived: bool,
}

/// Repository for carts and cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Return the user's cart id, creating the cart if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn ensure_cart(&self, user_id: UserId) -> Result<CartId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartId>(
            r"
            INSERT INTO bazaar.carts (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Cart lines joined with live product data, oldest first.
    ///
    /// `image` holds the untransformed source URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, LineRow>(
            r"
            SELECT ci.product_id, p.slug, p.name, p.images[1] AS image, ci.size, ci.quantity,
                   p.price, COALESCE(s.quantity, 0) AS available, p.is_archived
            FROM bazaar.carts c
            JOIN bazaar.cart_items ci ON ci.cart_id = c.id
            JOIN bazaar.products p ON p.id = ci.product_id
            LEFT JOIN bazaar.product_stock s
                ON s.product_id = ci.product_id AND s.size = ci.size
            WHERE c.user_id = $1
            ORDER BY ci.added_at, ci.product_id, ci.size
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(CartLine {
                    product_id: r.product_id,
                    slug: parse_slug(&r.slug)?,
                    name: r.name,
                    image: r.image,
                    size: r.size,
                    quantity: r.quantity,
                    unit_price: r.price,
                    available: r.available,
                    is_archived: r.is_archived,
                    line_total: Decimal::ZERO,
                })
            })
            .collect()
    }

    /// Current quantity of one line, if present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        size: &str,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM bazaar.cart_items WHERE cart_id = $1 AND product_id = $2 AND size = $3",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(size)
        .fetch_optional(self.pool)
        .await?;
        Ok(quantity)
    }

    /// Insert a line or overwrite its quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn set_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        size: &str,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO bazaar.cart_items (cart_id, product_id, size, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id, size) DO UPDATE SET quantity = EXCLUDED.quantity
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(size)
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove one line. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM bazaar.cart_items ci
            USING bazaar.carts c
            WHERE ci.cart_id = c.id AND c.user_id = $1 AND ci.product_id = $2 AND ci.size = $3
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(size)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_for_user(&mut conn, user_id).await
    }

    /// Total quantity across all lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COALESCE(SUM(ci.quantity), 0)::bigint
            FROM bazaar.carts c
            JOIN bazaar.cart_items ci ON ci.cart_id = c.id
            WHERE c.user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

/// Lock the user's cart lines for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<LockedLine>, RepositoryError> {
    let lines = sqlx::query_as::<_, LockedLine>(
        r"
        SELECT ci.product_id, p.name AS product_name, ci.size, ci.quantity, p.price, p.is_archived
        FROM bazaar.carts c
        JOIN bazaar.cart_items ci ON ci.cart_id = c.id
        JOIN bazaar.products p ON p.id = ci.product_id
        WHERE c.user_id = $1
        ORDER BY ci.product_id, ci.size
        FOR UPDATE OF ci
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

/// Delete every line in the user's cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn clear_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        DELETE FROM bazaar.cart_items ci
        USING bazaar.carts c
        WHERE ci.cart_id = c.id AND c.user_id = $1
        ",
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}
