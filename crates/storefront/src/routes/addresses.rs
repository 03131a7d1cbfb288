//! Saved address handlers. Every query is scoped to the signed-in user.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use bazaar_core::AddressId;

use crate::db::AddressRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::address::{Address, AddressInput};
use crate::state::AppState;

/// GET /api/addresses
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>, AppError> {
    Ok(Json(AddressRepository::new(state.pool()).list(user.id).await?))
}

/// Save an address. The first one becomes the default.
///
/// POST /api/addresses
///
/// # Errors
///
/// Returns 400 with the first invalid field.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let details = body.validate().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &details)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// PUT /api/addresses/{id}
///
/// # Errors
///
/// Returns 400 for invalid fields and 404 for addresses the user does not
/// own.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Json(body): Json<AddressInput>,
) -> Result<Json<Address>, AppError> {
    let details = body.validate().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &details)
        .await?;
    Ok(Json(address))
}

/// Delete an address. Deleting the default promotes the newest remaining
/// one.
///
/// DELETE /api/addresses/{id}
///
/// # Errors
///
/// Returns 404 for addresses the user does not own.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode, AppError> {
    AddressRepository::new(state.pool()).delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/addresses/{id}/default
///
/// # Errors
///
/// Returns 404 for addresses the user does not own.
pub async fn set_default(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>, AppError> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(Json(address))
}
