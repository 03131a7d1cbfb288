//! Review repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{ProductId, Rating, ReviewId, UserId};

use super::RepositoryError;
use crate::models::Page;
use crate::models::review::{RatingSummary, Review, ReviewInput};

const REVIEW_COLUMNS: &str = "r.id, r.product_id, r.user_id, u.name AS reviewer_name, r.rating, \
    r.title, r.body, r.verified_purchase, r.created_at, r.updated_at";

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    reviewer_name: Option<String>,
    rating: i16,
    title: String,
    body: String,
    verified_purchase: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i64::from(row.rating)).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid rating in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            reviewer_name: row
                .reviewer_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Customer".to_owned()),
            rating,
            title: row.title,
            body: row.body,
            verified_purchase: row.verified_purchase,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        page: Page,
    ) -> Result<Vec<Review>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {REVIEW_COLUMNS}
            FROM bazaar.reviews r
            JOIN bazaar.users u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2 OFFSET $3
            "
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(product_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Review::try_from)
            .collect()
    }

    /// Review counts per star value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, product_id: ProductId) -> Result<RatingSummary, RepositoryError> {
        let counts = sqlx::query_as::<_, (i16, i64)>(
            "SELECT rating, COUNT(*) FROM bazaar.reviews WHERE product_id = $1 GROUP BY rating",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(RatingSummary::from_counts(&counts))
    }

    /// Create or replace the user's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        product_id: ProductId,
        user_id: UserId,
        input: &ReviewInput,
        verified_purchase: bool,
    ) -> Result<Review, RepositoryError> {
        let id = sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO bazaar.reviews (product_id, user_id, rating, title, body, verified_purchase)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (product_id, user_id) DO UPDATE SET
                rating = EXCLUDED.rating,
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                verified_purchase = EXCLUDED.verified_purchase
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(i16::from(input.rating))
        .bind(&input.title)
        .bind(&input.body)
        .bind(verified_purchase)
        .fetch_one(self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Get a review by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {REVIEW_COLUMNS}
            FROM bazaar.reviews r
            JOIN bazaar.users u ON u.id = r.user_id
            WHERE r.id = $1
            "
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Review::try_from)
            .transpose()
    }

    /// The user's review of a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_mine(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<Option<Review>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {REVIEW_COLUMNS}
            FROM bazaar.reviews r
            JOIN bazaar.users u ON u.id = r.user_id
            WHERE r.product_id = $1 AND r.user_id = $2
            "
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(product_id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .map(Review::try_from)
            .transpose()
    }

    /// Delete the user's review of a product. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_mine(
        &self,
        product_id: ProductId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM bazaar.reviews WHERE product_id = $1 AND user_id = $2")
                .bind(product_id)
                .bind(user_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete any review (moderation). Returns the product it belonged to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<ProductId, RepositoryError> {
        sqlx::query_scalar::<_, ProductId>(
            "DELETE FROM bazaar.reviews WHERE id = $1 RETURNING product_id",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}
