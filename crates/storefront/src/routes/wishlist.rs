//! Wishlist route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::ProductId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::cart::{Cart, WishlistItem};
use crate::services::wishlist::WishlistService;
use crate::state::AppState;

fn wishlists(state: &AppState) -> WishlistService<'_> {
    WishlistService::new(state.pool(), state.images(), &state.config().checkout)
}

/// `POST /api/wishlist/items` payload.
#[derive(Debug, Deserialize)]
pub struct AddToWishlist {
    pub product_id: ProductId,
}

/// `POST /api/wishlist/items/{product_id}/move-to-cart` payload.
#[derive(Debug, Deserialize)]
pub struct MoveToCart {
    pub size: String,
}

/// GET /api/wishlist
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<WishlistItem>>, AppError> {
    Ok(Json(wishlists(&state).list(user.id).await?))
}

/// Save a product. Saving it again is a no-op.
///
/// POST /api/wishlist/items
///
/// # Errors
///
/// Returns 404 for unknown products.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddToWishlist>,
) -> Result<Json<Vec<WishlistItem>>, AppError> {
    let service = wishlists(&state);
    service.add(user.id, body.product_id).await?;
    Ok(Json(service.list(user.id).await?))
}

/// DELETE /api/wishlist/items/{product_id}
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    wishlists(&state).remove(user.id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add one unit of a size to the cart and drop the product from the
/// wishlist.
///
/// POST /api/wishlist/items/{product_id}/move-to-cart
///
/// # Errors
///
/// Returns 404 when the product is not on the wishlist, plus any cart
/// error.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<MoveToCart>,
) -> Result<Json<Cart>, AppError> {
    let cart = wishlists(&state)
        .move_to_cart(user.id, product_id, &body.size)
        .await?;
    Ok(Json(cart))
}
