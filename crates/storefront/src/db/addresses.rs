//! Address repository. Every query is scoped to the owning user.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::{AddressId, Pincode, UserId};

use super::RepositoryError;
use crate::models::address::{Address, AddressDetails};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, phone, line1, line2, city, state, pincode, \
                               is_default, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    full_name: String,
    phone: String,
    line1: String,
    line2: Option<String>,
    city: String,
    state: String,
    pincode: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for Address {
    type Error = RepositoryError;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        let pincode = Pincode::parse(&row.pincode).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid pincode in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            details: AddressDetails {
                full_name: row.full_name,
                phone: row.phone,
                line1: row.line1,
                line2: row.line2,
                city: row.city,
                state: row.state,
                pincode,
            },
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for shipping addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All addresses of a user, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM bazaar.addresses WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC"
        );
        sqlx::query_as::<_, AddressRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Address::try_from)
            .collect()
    }

    /// One address owned by the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM bazaar.addresses WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .map(Address::try_from)
            .transpose()
    }

    /// Create an address. The user's first address becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        details: &AddressDetails,
    ) -> Result<Address, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO bazaar.addresses
                (user_id, full_name, phone, line1, line2, city, state, pincode, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    NOT EXISTS (SELECT 1 FROM bazaar.addresses WHERE user_id = $1 AND is_default))
            RETURNING {ADDRESS_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(user_id)
            .bind(&details.full_name)
            .bind(&details.phone)
            .bind(&details.line1)
            .bind(details.line2.as_deref())
            .bind(&details.city)
            .bind(&details.state)
            .bind(details.pincode.as_str())
            .fetch_one(self.pool)
            .await?;
        Address::try_from(row)
    }

    /// Replace an address's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        details: &AddressDetails,
    ) -> Result<Address, RepositoryError> {
        let sql = format!(
            r"
            UPDATE bazaar.addresses SET
                full_name = $3, phone = $4, line1 = $5, line2 = $6,
                city = $7, state = $8, pincode = $9
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        );
        sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&details.full_name)
            .bind(&details.phone)
            .bind(&details.line1)
            .bind(details.line2.as_deref())
            .bind(&details.city)
            .bind(&details.state)
            .bind(details.pincode.as_str())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
            .and_then(Address::try_from)
    }

    /// Delete an address. If it was the default, the most recent remaining
    /// address is promoted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default = sqlx::query_scalar::<_, bool>(
            "DELETE FROM bazaar.addresses WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE bazaar.addresses SET is_default = TRUE
                WHERE id = (
                    SELECT id FROM bazaar.addresses WHERE user_id = $1
                    ORDER BY created_at DESC, id DESC LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Make an address the default, clearing the previous default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE bazaar.addresses SET is_default = FALSE WHERE user_id = $1 AND is_default AND id <> $2",
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE bazaar.addresses SET is_default = TRUE WHERE id = $1 AND user_id = $2 \
             RETURNING {ADDRESS_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Address::try_from(row)
    }
}
