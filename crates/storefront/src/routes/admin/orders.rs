//! Admin order management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use bazaar_core::OrderId;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::Paginated;
use crate::models::order::{
    AdminOrderQuery, AdminOrderSummary, OrderDetail, StatusUpdate, TrackingUpdate,
};
use crate::routes::orders::orders;
use crate::state::AppState;

/// GET /api/admin/orders?status=&payment_status=&page=&per_page=
///
/// # Errors
///
/// Returns 401/403 for non-admins.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<AdminOrderQuery>,
) -> Result<Json<Paginated<AdminOrderSummary>>, AppError> {
    Ok(Json(orders(&state).list_all(&query).await?))
}

/// GET /api/admin/orders/{id}
///
/// # Errors
///
/// Returns 404 for unknown orders.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(orders(&state).get(id).await?))
}

/// Move an order along its lifecycle.
///
/// PUT /api/admin/orders/{id}/status
///
/// # Errors
///
/// Returns 409 for transitions the order cannot make, 400 when shipping
/// without a tracking number and 502 when a refund fails.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, to = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(orders(&state).update_status(id, &body).await?))
}

/// PUT /api/admin/orders/{id}/tracking
///
/// # Errors
///
/// Returns 400 for an invalid tracking number and 404 for unknown orders.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn set_tracking(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<TrackingUpdate>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(orders(&state).set_tracking(id, &body.tracking_number).await?))
}
