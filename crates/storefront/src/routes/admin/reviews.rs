//! Review moderation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use bazaar_core::ReviewId;

use crate::db::ReviewRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// DELETE /api/admin/reviews/{id}
///
/// # Errors
///
/// Returns 404 for unknown reviews.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, AppError> {
    let product_id = ReviewRepository::new(state.pool()).delete(id).await?;
    state.products().invalidate(product_id);
    tracing::info!(review_id = %id, product_id = %product_id, "Review removed");
    Ok(StatusCode::NO_CONTENT)
}
