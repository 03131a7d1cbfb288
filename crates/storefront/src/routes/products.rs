//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use crate::error::AppError;
use crate::models::product::{CategoryCount, ProductDetail, ProductPage, ProductQuery};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.images(), state.products())
}

/// Product listing with filters, sort and pagination.
///
/// GET /api/products?category=&q=&min_price=&max_price=&sort=&page=&per_page=
///
/// # Errors
///
/// Returns 500 if the query fails.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductPage>, AppError> {
    Ok(Json(catalog(&state).list_products(&query).await?))
}

/// Product page.
///
/// GET /api/products/{slug}
///
/// # Errors
///
/// Returns 404 for unknown and archived products.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>, AppError> {
    let detail = catalog(&state)
        .get_product(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    Ok(Json(ProductDetail::clone(&detail)))
}

/// Categories with live product counts.
///
/// GET /api/categories
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryCount>>, AppError> {
    Ok(Json(catalog(&state).list_categories().await?))
}
