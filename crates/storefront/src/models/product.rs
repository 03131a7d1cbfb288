//! Catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{ProductId, Slug};

use super::review::RatingSummary;
use super::{PageParams, Paginated};

/// A product as stored, including archived ones.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: Slug,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    /// Source image URLs, first is the primary image.
    pub images: Vec<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock for one size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SizeStock {
    pub size: String,
    pub quantity: i32,
}

/// A product card in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub slug: Slug,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub thumbnail: Option<String>,
    pub in_stock: bool,
    pub average_rating: Option<Decimal>,
    pub review_count: i64,
}

/// One product image in the sizes the product page needs.
#[derive(Debug, Clone, Serialize)]
pub struct ProductImage {
    pub detail: String,
    pub zoom: String,
}

/// Full product page.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub slug: Slug,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub images: Vec<ProductImage>,
    pub sizes: Vec<SizeAvailability>,
    pub in_stock: bool,
    pub rating: RatingSummary,
}

/// Size selector entry on the product page.
#[derive(Debug, Clone, Serialize)]
pub struct SizeAvailability {
    pub size: String,
    pub available: i32,
    pub in_stock: bool,
}

impl From<SizeStock> for SizeAvailability {
    fn from(stock: SizeStock) -> Self {
        Self {
            in_stock: stock.quantity > 0,
            available: stock.quantity,
            size: stock.size,
        }
    }
}

/// Category with the number of live products in it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub product_count: i64,
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
}

impl ProductSort {
    /// `ORDER BY` clause for the listing query.
    ///
    /// Only ever interpolated from this closed set.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Rating => "average_rating DESC NULLS LAST, review_count DESC, p.id DESC",
        }
    }
}

/// `GET /api/products` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Filters after trimming empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub include_archived: bool,
    pub archived_only: Option<bool>,
}

impl ProductQuery {
    #[must_use]
    pub const fn paging(&self) -> PageParams {
        PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    #[must_use]
    pub fn filter(&self) -> ProductFilter {
        ProductFilter {
            category: non_empty(self.category.as_deref()),
            search: non_empty(self.q.as_deref()),
            min_price: self.min_price,
            max_price: self.max_price,
            include_archived: false,
            archived_only: None,
        }
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Product listing response.
pub type ProductPage = Paginated<ProductSummary>;

/// `GET /api/admin/products` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    /// `true` for archived only, `false` for live only, absent for both.
    pub archived: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl AdminProductQuery {
    #[must_use]
    pub const fn paging(&self) -> PageParams {
        PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    #[must_use]
    pub fn filter(&self) -> ProductFilter {
        ProductFilter {
            category: non_empty(self.category.as_deref()),
            search: non_empty(self.q.as_deref()),
            include_archived: true,
            archived_only: self.archived,
            ..ProductFilter::default()
        }
    }
}

/// Admin listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProductSummary {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub is_archived: bool,
}

/// Admin create payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: Vec<SizeStock>,
}

/// Admin partial update payload. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    /// `Some(None)` clears the compare-at price.
    #[serde(default, deserialize_with = "double_option")]
    pub compare_at_price: Option<Option<Decimal>>,
    pub images: Option<Vec<String>>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validated product columns for inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub slug: Slug,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub images: Vec<String>,
}

/// Validated partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub slug: Option<Slug>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Option<Decimal>>,
    pub images: Option<Vec<String>>,
}

impl NewProduct {
    /// Validate a create payload, deriving the slug from the name when absent.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn validate(self) -> Result<(ProductFields, Vec<SizeStock>), String> {
        let name = required_text("name", &self.name)?;
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Slug::parse(raw),
            _ => Slug::from_title(&name),
        }
        .map_err(|e| format!("slug: {e}"))?;
        let category = required_text("category", &self.category)?;
        validate_price("price", self.price)?;
        if let Some(compare_at) = self.compare_at_price {
            validate_price("compare_at_price", compare_at)?;
        }
        let stock = validate_stock(self.stock)?;

        Ok((
            ProductFields {
                slug,
                name,
                description: self.description.trim().to_owned(),
                category,
                price: self.price,
                compare_at_price: self.compare_at_price,
                images: clean_images(self.images),
            },
            stock,
        ))
    }
}

impl ProductUpdate {
    /// Validate a partial update.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn validate(self) -> Result<ProductChanges, String> {
        let slug = self
            .slug
            .as_deref()
            .map(|raw| Slug::parse(raw.trim()).map_err(|e| format!("slug: {e}")))
            .transpose()?;
        let name = self
            .name
            .as_deref()
            .map(|n| required_text("name", n))
            .transpose()?;
        let category = self
            .category
            .as_deref()
            .map(|c| required_text("category", c))
            .transpose()?;
        if let Some(price) = self.price {
            validate_price("price", price)?;
        }
        if let Some(Some(compare_at)) = self.compare_at_price {
            validate_price("compare_at_price", compare_at)?;
        }

        Ok(ProductChanges {
            slug,
            name,
            description: self.description.map(|d| d.trim().to_owned()),
            category,
            price: self.price,
            compare_at_price: self.compare_at_price,
            images: self.images.map(clean_images),
        })
    }
}

fn required_text(field: &str, value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(value.to_owned())
    }
}

fn validate_price(field: &str, price: Decimal) -> Result<(), String> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("{field} cannot be negative"));
    }
    if price.normalize().scale() > 2 {
        return Err(format!("{field} cannot have more than 2 decimal places"));
    }
    Ok(())
}

/// Validate stock entries from a create payload.
///
/// # Errors
///
/// Returns a message for blank sizes or negative quantities.
pub fn validate_stock(stock: Vec<SizeStock>) -> Result<Vec<SizeStock>, String> {
    stock
        .into_iter()
        .map(|entry| {
            let size = validate_size(&entry.size)?;
            if entry.quantity < 0 {
                return Err(format!("stock for size {size} cannot be negative"));
            }
            Ok(SizeStock {
                size,
                quantity: entry.quantity,
            })
        })
        .collect()
}

/// Normalise a size label such as ` m ` to `M`.
///
/// # Errors
///
/// Returns a message when the size is blank or longer than 20 characters.
pub fn validate_size(raw: &str) -> Result<String, String> {
    let size = raw.trim().to_uppercase();
    if size.is_empty() {
        return Err("size is required".to_owned());
    }
    if size.chars().count() > 20 {
        return Err("size must be at most 20 characters".to_owned());
    }
    Ok(size)
}

fn clean_images(images: Vec<String>) -> Vec<String> {
    images
        .into_iter()
        .map(|url| url.trim().to_owned())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Product as the admin sees it: everything plus stock.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProduct {
    #[serde(flatten)]
    pub product: Product,
    pub stock: Vec<SizeStock>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let query: ProductQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort, ProductSort::Newest);
        assert_eq!(query.filter(), ProductFilter::default());
    }

    #[test]
    fn test_query_blank_strings_are_ignored() {
        let query = ProductQuery {
            category: Some("  ".to_string()),
            q: Some(" kurta ".to_string()),
            ..ProductQuery::default()
        };
        let filter = query.filter();
        assert_eq!(filter.category, None);
        assert_eq!(filter.search.as_deref(), Some("kurta"));
    }

    #[test]
    fn test_admin_query_includes_archived() {
        let query: AdminProductQuery = serde_json::from_str(r#"{"archived": true}"#).unwrap();
        let filter = query.filter();
        assert!(filter.include_archived);
        assert_eq!(filter.archived_only, Some(true));

        let all = AdminProductQuery::default().filter();
        assert!(all.include_archived);
        assert_eq!(all.archived_only, None);
    }

    #[test]
    fn test_sort_parses_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert!(sort.order_by().starts_with("p.price DESC"));
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: ProductUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.compare_at_price, None);

        let cleared: ProductUpdate =
            serde_json::from_str(r#"{"compare_at_price": null}"#).unwrap();
        assert_eq!(cleared.compare_at_price, Some(None));
    }

    #[test]
    fn test_new_product_derives_slug() {
        let payload: NewProduct = serde_json::from_str(
            r#"{"name": "Handloom Saree (Red)", "category": "sarees", "price": "2499.00",
                "stock": [{"size": " free ", "quantity": 4}]}"#,
        )
        .unwrap();
        let (fields, stock) = payload.validate().unwrap();
        assert_eq!(fields.slug.as_str(), "handloom-saree-red");
        assert_eq!(stock[0].size, "FREE");
    }

    #[test]
    fn test_new_product_rejects_negative_price() {
        let payload: NewProduct =
            serde_json::from_str(r#"{"name": "Tee", "category": "tops", "price": "-1"}"#).unwrap();
        assert!(payload.validate().unwrap_err().contains("negative"));
    }

    #[test]
    fn test_new_product_rejects_negative_stock() {
        let payload: NewProduct = serde_json::from_str(
            r#"{"name": "Tee", "category": "tops", "price": "10",
                "stock": [{"size": "M", "quantity": -2}]}"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_update_validates_slug() {
        let update = ProductUpdate {
            slug: Some("Not A Slug".to_string()),
            ..ProductUpdate::default()
        };
        assert!(update.validate().unwrap_err().starts_with("slug"));
    }

    #[test]
    fn test_size_availability() {
        let sold_out = SizeAvailability::from(SizeStock {
            size: "M".to_string(),
            quantity: 0,
        });
        assert!(!sold_out.in_stock);
    }
}
