//! Magic-link login tokens.
//!
//! Only the SHA-256 hex digest of a token is stored.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::UserId;

use super::RepositoryError;

/// Repository for magic-link tokens.
pub struct LoginTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LoginTokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a token hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO bazaar.login_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Consume a token, returning its user if it was unused and unexpired.
    ///
    /// The single `UPDATE` makes concurrent consumption of the same token
    /// succeed at most once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn consume(&self, token_hash: &str) -> Result<Option<UserId>, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, UserId>(
            r"
            UPDATE bazaar.login_tokens
            SET consumed_at = now()
            WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > now()
            RETURNING user_id
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(user_id)
    }

    /// Delete tokens that expired more than a day ago.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM bazaar.login_tokens WHERE expires_at < now() - interval '1 day'",
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
