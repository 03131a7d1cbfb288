//! Admin catalog management.
//!
//! Every write drops the product from the detail cache.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::ProductId;

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::Paginated;
use crate::models::product::{
    AdminProduct, AdminProductQuery, AdminProductSummary, NewProduct, Product, ProductUpdate,
    validate_size,
};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// `PUT /api/admin/products/{id}/stock` payload.
#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub size: String,
    pub quantity: i32,
}

async fn with_stock(state: &AppState, product: Product) -> Result<AdminProduct, AppError> {
    let stock = ProductRepository::new(state.pool()).stock(product.id).await?;
    Ok(AdminProduct { product, stock })
}

async fn load(state: &AppState, id: ProductId) -> Result<AdminProduct, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    with_stock(state, product).await
}

/// GET /api/admin/products?q=&category=&archived=&sort=&page=&per_page=
///
/// # Errors
///
/// Returns 401/403 for non-admins.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<AdminProductQuery>,
) -> Result<Json<Paginated<AdminProductSummary>>, AppError> {
    let page = CatalogService::new(state.pool(), state.images(), state.products())
        .list_admin(&query)
        .await?;
    Ok(Json(page))
}

/// Create a product. The slug is derived from the name when absent.
///
/// POST /api/admin/products
///
/// # Errors
///
/// Returns 400 for invalid fields and 409 when the slug is taken.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<AdminProduct>), AppError> {
    let (fields, stock) = body.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .create(&fields, &stock)
        .await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");

    Ok((StatusCode::CREATED, Json(with_stock(&state, product).await?)))
}

/// Partial update. Absent fields are left unchanged.
///
/// PATCH /api/admin/products/{id}
///
/// # Errors
///
/// Returns 400 for invalid fields, 404 for unknown products and 409 when
/// the new slug is taken.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductUpdate>,
) -> Result<Json<AdminProduct>, AppError> {
    let changes = body.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .update(id, &changes)
        .await?;
    state.products().invalidate(id);

    Ok(Json(with_stock(&state, product).await?))
}

async fn set_archived(state: &AppState, id: ProductId, archived: bool) -> Result<AdminProduct, AppError> {
    let product = ProductRepository::new(state.pool())
        .set_archived(id, archived)
        .await?;
    state.products().invalidate(id);
    tracing::info!(product_id = %id, archived, "Product archive flag changed");
    with_stock(state, product).await
}

/// Hide a product from the storefront.
///
/// POST /api/admin/products/{id}/archive
///
/// # Errors
///
/// Returns 404 for unknown products.
pub async fn archive(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<AdminProduct>, AppError> {
    Ok(Json(set_archived(&state, id, true).await?))
}

/// POST /api/admin/products/{id}/unarchive
///
/// # Errors
///
/// Returns 404 for unknown products.
pub async fn unarchive(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<AdminProduct>, AppError> {
    Ok(Json(set_archived(&state, id, false).await?))
}

/// Set the stock for one size, adding the size if it is new.
///
/// PUT /api/admin/products/{id}/stock
///
/// # Errors
///
/// Returns 400 for a blank size or negative quantity and 404 for unknown
/// products.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_stock(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<StockUpdate>,
) -> Result<Json<AdminProduct>, AppError> {
    let size = validate_size(&body.size).map_err(AppError::BadRequest)?;
    if body.quantity < 0 {
        return Err(AppError::BadRequest("quantity cannot be negative".to_string()));
    }

    ProductRepository::new(state.pool())
        .set_stock(id, &size, body.quantity)
        .await?;
    state.products().invalidate(id);

    Ok(Json(load(&state, id).await?))
}

/// Remove a size.
///
/// DELETE /api/admin/products/{id}/stock/{size}
///
/// # Errors
///
/// Returns 404 when the product has no such size.
pub async fn delete_size(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path((id, size)): Path<(ProductId, String)>,
) -> Result<Json<AdminProduct>, AppError> {
    let size = validate_size(&size).map_err(AppError::BadRequest)?;
    let deleted = ProductRepository::new(state.pool())
        .delete_size(id, &size)
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Size not found".to_string()));
    }
    state.products().invalidate(id);

    Ok(Json(load(&state, id).await?))
}
