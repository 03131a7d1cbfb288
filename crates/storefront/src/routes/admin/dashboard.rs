//! Admin dashboard.

use axum::{Json, extract::State};
use chrono::Utc;

use crate::db::DashboardRepository;
use crate::db::dashboard::DashboardStats;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Revenue, order counts, user count and low-stock sizes.
///
/// GET /api/admin/dashboard
///
/// # Errors
///
/// Returns 401/403 for non-admins and 500 if a query fails.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = DashboardRepository::new(state.pool())
        .stats(Utc::now())
        .await?;
    Ok(Json(stats))
}
