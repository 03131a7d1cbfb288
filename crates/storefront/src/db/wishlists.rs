//! Wishlist repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{ProductId, UserId, WishlistId};

use super::RepositoryError;
use super::products::parse_slug;
use crate::models::cart::WishlistItem;

#[derive(sqlx::FromRow)]
struct ItemRow {
    product_id: ProductId,
    slug: String,
    name: String,
    price: Decimal,
    image: Option<String>,
    in_stock: bool,
    is_archived: bool,
    added_at: DateTime<Utc>,
}

/// Repository for wishlists.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Return the user's wishlist id, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn ensure_wishlist(&self, user_id: UserId) -> Result<WishlistId, RepositoryError> {
        let id = sqlx::query_scalar::<_, WishlistId>(
            r"
            INSERT INTO bazaar.wishlists (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Wishlist entries, newest first. `image` is the untransformed source URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, user_id: UserId) -> Result<Vec<WishlistItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT wi.product_id, p.slug, p.name, p.price, p.images[1] AS image,
                   EXISTS (
                       SELECT 1 FROM bazaar.product_stock s
                       WHERE s.product_id = p.id AND s.quantity > 0
                   ) AS in_stock,
                   p.is_archived, wi.added_at
            FROM bazaar.wishlists w
            JOIN bazaar.wishlist_items wi ON wi.wishlist_id = w.id
            JOIN bazaar.products p ON p.id = wi.product_id
            WHERE w.user_id = $1
            ORDER BY wi.added_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(WishlistItem {
                    product_id: r.product_id,
                    slug: parse_slug(&r.slug)?,
                    name: r.name,
                    price: r.price,
                    image: r.image,
                    in_stock: r.in_stock,
                    is_archived: r.is_archived,
                    added_at: r.added_at,
                })
            })
            .collect()
    }

    /// Add a product. Adding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add(
        &self,
        wishlist_id: WishlistId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO bazaar.wishlist_items (wishlist_id, product_id) VALUES ($1, $2)
            ON CONFLICT (wishlist_id, product_id) DO NOTHING
            ",
        )
        .bind(wishlist_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove a product. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM bazaar.wishlist_items wi
            USING bazaar.wishlists w
            WHERE wi.wishlist_id = w.id AND w.user_id = $1 AND wi.product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the product is on the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM bazaar.wishlists w
                JOIN bazaar.wishlist_items wi ON wi.wishlist_id = w.id
                WHERE w.user_id = $1 AND wi.product_id = $2
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }
}
