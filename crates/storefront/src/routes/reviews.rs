//! Product review handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use bazaar_core::Slug;

use crate::db::{OrderRepository, ProductRepository, ReviewRepository};
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::product::Product;
use crate::models::review::{Review, ReviewInput, ReviewPage};
use crate::models::{DEFAULT_PER_PAGE, Page, PageParams, Paginated};
use crate::state::AppState;

/// Live product for a slug, or 404.
async fn live_product(state: &AppState, slug: &str) -> Result<Product, AppError> {
    let not_found = || AppError::NotFound("Product not found".to_string());
    let slug = Slug::parse(slug).map_err(|_| not_found())?;
    ProductRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .filter(|product| !product.is_archived)
        .ok_or_else(not_found)
}

/// Reviews of a product with the rating summary.
///
/// GET /api/products/{slug}/reviews?page=&per_page=
///
/// Signed-in callers also get their own review under `mine`.
///
/// # Errors
///
/// Returns 404 for unknown or archived products.
#[instrument(skip(state, viewer))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ReviewPage>, AppError> {
    let product = live_product(&state, &slug).await?;
    let reviews = ReviewRepository::new(state.pool());
    let page = Page::from_params(params, DEFAULT_PER_PAGE);

    let summary = reviews.summary(product.id).await?;
    let items = reviews.list_for_product(product.id, page).await?;
    let total = summary.count;
    let mine = match viewer {
        Some(user) => reviews.get_mine(product.id, user.id).await?,
        None => None,
    };

    Ok(Json(ReviewPage {
        summary,
        reviews: Paginated::new(items, page, total),
        mine,
    }))
}

/// Create or replace the caller's review of a product.
///
/// PUT /api/products/{slug}/reviews/mine
///
/// # Errors
///
/// Returns 401 when signed out, 404 for unknown products and 400 for
/// overlong text.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn upsert_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(body): Json<ReviewInput>,
) -> Result<Json<Review>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let product = live_product(&state, &slug).await?;

    let verified = OrderRepository::new(state.pool())
        .has_purchased(user.id, product.id)
        .await?;
    let review = ReviewRepository::new(state.pool())
        .upsert(product.id, user.id, &input, verified)
        .await?;
    state.products().invalidate(product.id);

    Ok(Json(review))
}

/// Delete the caller's review of a product.
///
/// DELETE /api/products/{slug}/reviews/mine
///
/// # Errors
///
/// Returns 404 when the product or the review does not exist.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    let product = live_product(&state, &slug).await?;
    let deleted = ReviewRepository::new(state.pool())
        .delete_mine(product.id, user.id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Review not found".to_string()));
    }
    state.products().invalidate(product.id);

    Ok(StatusCode::NO_CONTENT)
}
