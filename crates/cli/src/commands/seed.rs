//! Seed the catalog from a YAML file.
//!
//! The file is a list of products in the same shape the admin API accepts:
//!
//! ```yaml
//! - name: Linen Shirt
//!   category: shirts
//!   price: "1499.00"
//!   images: ["https://cdn.example.com/linen.jpg"]
//!   stock:
//!     - { size: M, quantity: 10 }
//!     - { size: L, quantity: 4 }
//! ```
//!
//! Products are upserted by slug, so re-running the seed refreshes prices and
//! stock instead of duplicating rows.

use std::path::Path;

use bazaar_storefront::db::{ProductRepository, RepositoryError};
use bazaar_storefront::models::product::{NewProduct, ProductFields, SizeStock};
use thiserror::Error;
use tracing::info;

use super::ConnectError;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid products:\n{0}")]
    Invalid(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Upsert every product in `file_path`.
///
/// The whole file is validated before the database is touched.
///
/// # Errors
///
/// Returns `SeedError::Invalid` listing every bad entry, or the first
/// database failure.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse_products(&content)?;
    info!(count = products.len(), "Parsed products");

    let pool = super::connect().await?;
    let repo = ProductRepository::new(&pool);

    for (fields, stock) in &products {
        let product = repo.upsert_by_slug(fields, stock).await?;
        info!(slug = %product.slug, "Seeded product");
    }

    info!(count = products.len(), "Seeding complete");
    Ok(())
}

/// Parse and validate a product file.
fn parse_products(content: &str) -> Result<Vec<(ProductFields, Vec<SizeStock>)>, SeedError> {
    let raw: Vec<NewProduct> = serde_yaml::from_str(content)?;

    let mut products = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();
    for (index, product) in raw.into_iter().enumerate() {
        let name = product.name.clone();
        match product.validate() {
            Ok(valid) => products.push(valid),
            Err(e) => errors.push(format!("  #{} ({name}): {e}", index + 1)),
        }
    }

    if errors.is_empty() {
        Ok(products)
    } else {
        Err(SeedError::Invalid(errors.join("\n")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let yaml = r#"
- name: Linen Shirt
  category: shirts
  price: "1499.00"
  stock:
    - { size: m, quantity: 10 }
"#;
        let products = parse_products(yaml).unwrap();
        assert_eq!(products.len(), 1);
        let (fields, stock) = products.first().unwrap();
        assert_eq!(fields.slug.as_str(), "linen-shirt");
        assert_eq!(stock.first().unwrap().size, "M");
    }

    #[test]
    fn test_parse_products_reports_every_bad_entry() {
        let yaml = r#"
- name: ""
  category: shirts
  price: "10"
- name: Ok Shirt
  category: shirts
  price: "10"
- name: Free Shirt
  category: shirts
  price: "-1"
"#;
        let Err(SeedError::Invalid(message)) = parse_products(yaml) else {
            panic!("expected validation failure");
        };
        assert!(message.contains("#1"));
        assert!(message.contains("#3"));
        assert!(!message.contains("#2"));
    }
}
