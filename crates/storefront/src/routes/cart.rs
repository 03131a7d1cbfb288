//! Cart route handlers.
//!
//! Every handler answers with the full priced cart so the client never has
//! to recompute totals.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::cart::{Cart, CartItemInput, CartItemKey};
use crate::services::cart::CartService;
use crate::state::AppState;

fn carts(state: &AppState) -> CartService<'_> {
    CartService::new(state.pool(), state.images(), &state.config().checkout)
}

/// Cart badge count.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

/// GET /api/cart
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(carts(&state).get_cart(user.id).await?))
}

/// Add a product size, merging into an existing line.
///
/// POST /api/cart/items
///
/// # Errors
///
/// Returns 404 for unknown products, 400 for unknown sizes or bad
/// quantities and 409 when stock runs short.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CartItemInput>,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(carts(&state).add_item(user.id, &body).await?))
}

/// Set a line's quantity. Zero removes it.
///
/// PATCH /api/cart/items
///
/// # Errors
///
/// Returns 404 when the line is not in the cart and 409 when stock runs
/// short.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CartItemInput>,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(carts(&state).update_item(user.id, &body).await?))
}

/// DELETE /api/cart/items
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CartItemKey>,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(carts(&state).remove_item(user.id, &body).await?))
}

/// DELETE /api/cart
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(carts(&state).clear(user.id).await?))
}

/// Total quantity in the cart.
///
/// GET /api/cart/count
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartCount>, AppError> {
    let count = carts(&state).count(user.id).await?;
    Ok(Json(CartCount { count }))
}
