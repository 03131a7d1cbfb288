//! Product and stock repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bazaar_core::{ProductId, Slug};

use super::RepositoryError;
use super::users::escape_like;
use crate::models::Page;
use crate::models::product::{
    CategoryCount, Product, ProductChanges, ProductFields, ProductFilter, ProductSort, SizeStock,
};

const PRODUCT_COLUMNS: &str = "id, slug, name, description, category, price, compare_at_price, \
                               images, is_archived, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    slug: String,
    name: String,
    description: String,
    category: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    images: Vec<String>,
    is_archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            slug: parse_slug(&row.slug)?,
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            compare_at_price: row.compare_at_price,
            images: row.images,
            is_archived: row.is_archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn parse_slug(raw: &str) -> Result<Slug, RepositoryError> {
    Slug::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid slug in database: {e}")))
}

/// A listing row before image URLs are transformed.
#[derive(Debug, Clone)]
pub struct ProductListRow {
    pub id: ProductId,
    pub slug: Slug,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub image: Option<String>,
    pub in_stock: bool,
    pub average_rating: Option<Decimal>,
    pub review_count: i64,
    pub is_archived: bool,
}

#[derive(sqlx::FromRow)]
struct ListRow {
    id: ProductId,
    slug: String,
    name: String,
    category: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    image: Option<String>,
    in_stock: bool,
    average_rating: Option<Decimal>,
    review_count: i64,
    is_archived: bool,
}

// $1 include archived, $2 archived only, $3 category, $4 search pattern,
// $5 min price, $6 max price.
const LIST_FILTER: &str = r"
    ($1::bool OR NOT p.is_archived)
    AND ($2::bool IS NULL OR p.is_archived = $2)
    AND ($3::text IS NULL OR p.category = $3)
    AND ($4::text IS NULL OR p.name ILIKE $4 OR p.description ILIKE $4)
    AND ($5::numeric IS NULL OR p.price >= $5)
    AND ($6::numeric IS NULL OR p.price <= $6)
";

/// Repository for catalog data.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter, with stock and rating aggregates.
    ///
    /// Returns the page of rows and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        page: Page,
    ) -> Result<(Vec<ProductListRow>, i64), RepositoryError> {
        let pattern = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", escape_like(s)));

        let count_sql = format!("SELECT COUNT(*) FROM bazaar.products p WHERE {LIST_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.include_archived)
            .bind(filter.archived_only)
            .bind(filter.category.as_deref())
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(self.pool)
            .await?;

        let list_sql = format!(
            r"
            SELECT p.id, p.slug, p.name, p.category, p.price, p.compare_at_price,
                   p.images[1] AS image,
                   EXISTS (
                       SELECT 1 FROM bazaar.product_stock s
                       WHERE s.product_id = p.id AND s.quantity > 0
                   ) AS in_stock,
                   r.average_rating,
                   COALESCE(r.review_count, 0) AS review_count,
                   p.is_archived
            FROM bazaar.products p
            LEFT JOIN (
                SELECT product_id,
                       ROUND(AVG(rating)::numeric, 1) AS average_rating,
                       COUNT(*) AS review_count
                FROM bazaar.reviews
                GROUP BY product_id
            ) r ON r.product_id = p.id
            WHERE {LIST_FILTER}
            ORDER BY {order_by}
            LIMIT $7 OFFSET $8
            ",
            order_by = sort.order_by()
        );

        let rows = sqlx::query_as::<_, ListRow>(&list_sql)
            .bind(filter.include_archived)
            .bind(filter.archived_only)
            .bind(filter.category.as_deref())
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(|r| {
                Ok(ProductListRow {
                    id: r.id,
                    slug: parse_slug(&r.slug)?,
                    name: r.name,
                    category: r.category,
                    price: r.price,
                    compare_at_price: r.compare_at_price,
                    image: r.image,
                    in_stock: r.in_stock,
                    average_rating: r.average_rating,
                    review_count: r.review_count,
                    is_archived: r.is_archived,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok((items, total))
    }

    /// Get a product by slug, including archived ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM bazaar.products WHERE slug = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(slug.as_str())
            .fetch_optional(self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// Get a product by ID, including archived ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM bazaar.products WHERE id = $1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// Per-size stock for a product, ordered by size.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock(&self, id: ProductId) -> Result<Vec<SizeStock>, RepositoryError> {
        let rows = sqlx::query_as::<_, SizeStock>(
            "SELECT size, quantity FROM bazaar.product_stock WHERE product_id = $1 ORDER BY size",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Available quantity for one size, `None` when the size does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_for_size(
        &self,
        id: ProductId,
        size: &str,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM bazaar.product_stock WHERE product_id = $1 AND size = $2",
        )
        .bind(id)
        .bind(size)
        .fetch_optional(self.pool)
        .await?;
        Ok(quantity)
    }

    /// Categories of live products with counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            r"
            SELECT category, COUNT(*) AS product_count
            FROM bazaar.products
            WHERE NOT is_archived
            GROUP BY category
            ORDER BY category
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Create a product with its initial stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        fields: &ProductFields,
        stock: &[SizeStock],
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO bazaar.products
                (slug, name, description, category, price, compare_at_price, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(fields.slug.as_str())
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.category)
            .bind(fields.price)
            .bind(fields.compare_at_price)
            .bind(&fields.images)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "slug already exists"))?;

        for entry in stock {
            upsert_stock(&mut tx, row.id, &entry.size, entry.quantity).await?;
        }

        tx.commit().await?;
        Product::try_from(row)
    }

    /// Insert or update a product by slug and replace its stock levels.
    ///
    /// Used by catalog seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn upsert_by_slug(
        &self,
        fields: &ProductFields,
        stock: &[SizeStock],
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO bazaar.products
                (slug, name, description, category, price, compare_at_price, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                images = EXCLUDED.images
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(fields.slug.as_str())
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(&fields.category)
            .bind(fields.price)
            .bind(fields.compare_at_price)
            .bind(&fields.images)
            .fetch_one(&mut *tx)
            .await?;

        for entry in stock {
            upsert_stock(&mut tx, row.id, &entry.size, entry.quantity).await?;
        }

        tx.commit().await?;
        Product::try_from(row)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let (set_compare_at, compare_at) = match changes.compare_at_price {
            Some(value) => (true, value),
            None => (false, None),
        };

        let sql = format!(
            r"
            UPDATE bazaar.products SET
                slug = COALESCE($2, slug),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                category = COALESCE($5, category),
                price = COALESCE($6, price),
                compare_at_price = CASE WHEN $7 THEN $8 ELSE compare_at_price END,
                images = COALESCE($9, images)
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(changes.slug.as_ref().map(Slug::as_str))
            .bind(changes.name.as_deref())
            .bind(changes.description.as_deref())
            .bind(changes.category.as_deref())
            .bind(changes.price)
            .bind(set_compare_at)
            .bind(compare_at)
            .bind(changes.images.as_deref())
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "slug already exists"))?
            .ok_or(RepositoryError::NotFound)
            .and_then(Product::try_from)
    }

    /// Archive or restore a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_archived(
        &self,
        id: ProductId,
        archived: bool,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            "UPDATE bazaar.products SET is_archived = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(archived)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
            .and_then(Product::try_from)
    }

    /// Set the stock level for one size, creating the size if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_stock(
        &self,
        id: ProductId,
        size: &str,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_stock(&mut tx, id, size, quantity).await.map_err(|e| match e {
            RepositoryError::Database(sqlx::Error::Database(ref db))
                if db.is_foreign_key_violation() =>
            {
                RepositoryError::NotFound
            }
            other => other,
        })?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove a size from a product.
    ///
    /// Returns `false` when the size did not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_size(&self, id: ProductId, size: &str) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM bazaar.product_stock WHERE product_id = $1 AND size = $2")
                .bind(id)
                .bind(size)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn upsert_stock(
    conn: &mut sqlx::PgConnection,
    id: ProductId,
    size: &str,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO bazaar.product_stock (product_id, size, quantity) VALUES ($1, $2, $3)
        ON CONFLICT (product_id, size) DO UPDATE SET quantity = EXCLUDED.quantity
        ",
    )
    .bind(id)
    .bind(size)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}
