//! Product browsing with a response cache for product pages.
//!
//! Product detail responses are cached in `moka` for 5 minutes. Admin
//! writes and stock movements invalidate the affected product.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::instrument;

use bazaar_core::{ProductId, Slug};

use crate::db::products::ProductListRow;
use crate::db::{ProductRepository, RepositoryError, ReviewRepository};
use crate::models::product::{
    AdminProductQuery, AdminProductSummary, CategoryCount, ProductDetail, ProductImage,
    ProductPage, ProductQuery, ProductSummary, SizeAvailability,
};
use crate::models::{DEFAULT_PER_PAGE, Page, Paginated};
use crate::services::images::{ImagePreset, ImageTransformer};

/// Cache of product detail responses keyed by slug.
#[derive(Clone)]
pub struct ProductCache {
    entries: Cache<String, Arc<ProductDetail>>,
}

impl Default for ProductCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCache {
    #[must_use]
    pub fn new() -> Self {
        let entries = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .support_invalidation_closures()
            .build();
        Self { entries }
    }

    async fn get(&self, slug: &str) -> Option<Arc<ProductDetail>> {
        self.entries.get(slug).await
    }

    async fn insert(&self, detail: Arc<ProductDetail>) {
        self.entries
            .insert(detail.slug.as_str().to_owned(), detail)
            .await;
    }

    /// Drop a cached product by id.
    pub fn invalidate(&self, id: ProductId) {
        if let Err(e) = self
            .entries
            .invalidate_entries_if(move |_, detail| detail.id == id)
        {
            tracing::warn!(product_id = %id, error = %e, "Failed to invalidate product cache");
        }
    }

    /// Drop several cached products.
    pub fn invalidate_many(&self, ids: &[ProductId]) {
        for id in ids {
            self.invalidate(*id);
        }
    }
}

/// Read side of the catalog.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    reviews: ReviewRepository<'a>,
    images: &'a ImageTransformer,
    cache: &'a ProductCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        images: &'a ImageTransformer,
        cache: &'a ProductCache,
    ) -> Self {
        Self {
            products: ProductRepository::new(pool),
            reviews: ReviewRepository::new(pool),
            images,
            cache,
        }
    }

    /// One page of live products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, RepositoryError> {
        let page = Page::from_params(query.paging(), DEFAULT_PER_PAGE);
        let (rows, total) = self
            .products
            .list(&query.filter(), query.sort, page)
            .await?;

        let items = rows.into_iter().map(|row| self.summary(row)).collect();
        Ok(Paginated::new(items, page, total))
    }

    /// One page of products for the admin, archived ones included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_admin(
        &self,
        query: &AdminProductQuery,
    ) -> Result<Paginated<AdminProductSummary>, RepositoryError> {
        let page = Page::from_params(query.paging(), DEFAULT_PER_PAGE);
        let (rows, total) = self
            .products
            .list(&query.filter(), query.sort, page)
            .await?;

        let items = rows
            .into_iter()
            .map(|row| AdminProductSummary {
                is_archived: row.is_archived,
                summary: self.summary(row),
            })
            .collect();
        Ok(Paginated::new(items, page, total))
    }

    /// Product page by slug. Archived products and malformed slugs are `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        slug: &str,
    ) -> Result<Option<Arc<ProductDetail>>, RepositoryError> {
        let Ok(slug) = Slug::parse(slug) else {
            return Ok(None);
        };

        if let Some(cached) = self.cache.get(slug.as_str()).await {
            return Ok(Some(cached));
        }

        let Some(product) = self.products.get_by_slug(&slug).await? else {
            return Ok(None);
        };
        if product.is_archived {
            return Ok(None);
        }

        let sizes: Vec<SizeAvailability> = self
            .products
            .stock(product.id)
            .await?
            .into_iter()
            .map(SizeAvailability::from)
            .collect();
        let rating = self.reviews.summary(product.id).await?;

        let images = product
            .images
            .iter()
            .map(|source| ProductImage {
                detail: self.images.url(source, ImagePreset::Detail),
                zoom: self.images.url(source, ImagePreset::Zoom),
            })
            .collect();

        let detail = Arc::new(ProductDetail {
            id: product.id,
            slug: product.slug,
            name: product.name,
            description: product.description,
            category: product.category,
            price: product.price,
            compare_at_price: product.compare_at_price,
            images,
            in_stock: sizes.iter().any(|s| s.in_stock),
            sizes,
            rating,
        });

        self.cache.insert(Arc::clone(&detail)).await;
        Ok(Some(detail))
    }

    /// Categories of live products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        self.products.categories().await
    }

    fn summary(&self, row: ProductListRow) -> ProductSummary {
        ProductSummary {
            thumbnail: row
                .image
                .as_deref()
                .map(|source| self.images.url(source, ImagePreset::Thumbnail)),
            id: row.id,
            slug: row.slug,
            name: row.name,
            category: row.category,
            price: row.price,
            compare_at_price: row.compare_at_price,
            in_stock: row.in_stock,
            average_rating: row.average_rating,
            review_count: row.review_count,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::review::RatingSummary;

    fn detail(id: i32, slug: &str) -> Arc<ProductDetail> {
        Arc::new(ProductDetail {
            id: ProductId::new(id),
            slug: Slug::parse(slug).unwrap(),
            name: "Kurta".to_string(),
            description: String::new(),
            category: "kurtas".to_string(),
            price: Decimal::ONE_HUNDRED,
            compare_at_price: None,
            images: vec![],
            sizes: vec![],
            in_stock: false,
            rating: RatingSummary::from_counts(&[]),
        })
    }

    #[tokio::test]
    async fn test_cache_hit_by_slug() {
        let cache = ProductCache::new();
        cache.insert(detail(1, "indigo-kurta")).await;
        assert_eq!(
            cache.get("indigo-kurta").await.map(|d| d.id),
            Some(ProductId::new(1))
        );
        assert!(cache.get("linen-shirt").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidate_by_id_keeps_others() {
        let cache = ProductCache::new();
        cache.insert(detail(1, "indigo-kurta")).await;
        cache.insert(detail(2, "linen-shirt")).await;

        cache.invalidate(ProductId::new(1));
        cache.entries.run_pending_tasks().await;
        assert!(cache.get("indigo-kurta").await.is_none());
        assert!(cache.get("linen-shirt").await.is_some());
    }
}
