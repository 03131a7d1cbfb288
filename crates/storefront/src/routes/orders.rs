//! Customer order history.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use bazaar_core::OrderId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::order::{OrderDetail, OrderSummary};
use crate::models::{PageParams, Paginated};
use crate::services::orders::OrderService;
use crate::services::payments::RazorpayClient;
use crate::state::AppState;

pub(crate) fn orders(state: &AppState) -> OrderService<'_, RazorpayClient> {
    OrderService::new(
        state.pool(),
        state.gateway(),
        state.products(),
        state.mailer(),
    )
}

/// GET /api/orders?page=&per_page=
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<OrderSummary>>, AppError> {
    Ok(Json(orders(&state).list_mine(user.id, params).await?))
}

/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns 404 for orders the caller did not place.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(orders(&state).get_mine(user.id, id).await?))
}

/// Cancel an order that has not shipped. Paid orders are refunded.
///
/// POST /api/orders/{id}/cancel
///
/// # Errors
///
/// Returns 409 once the order can no longer be cancelled and 502 when the
/// refund fails (the order is left untouched).
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(orders(&state).cancel_mine(user.id, id).await?))
}
