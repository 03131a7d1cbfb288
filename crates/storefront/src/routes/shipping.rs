//! Delivery estimates.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use bazaar_core::Pincode;

use crate::error::AppError;
use crate::services::shipping::ShippingEstimate;
use crate::state::AppState;

/// `GET /api/shipping/estimate` query.
#[derive(Debug, Deserialize)]
pub struct EstimateQuery {
    pub pincode: String,
}

/// Expected delivery window for a pincode.
///
/// GET /api/shipping/estimate?pincode=560001
///
/// # Errors
///
/// Returns 400 for a malformed pincode.
pub async fn estimate(
    State(state): State<AppState>,
    Query(query): Query<EstimateQuery>,
) -> Result<Json<ShippingEstimate>, AppError> {
    let pincode = Pincode::parse(query.pincode.trim())
        .map_err(|e| AppError::BadRequest(format!("pincode: {e}")))?;
    Ok(Json(state.shipping().estimate(&pincode).await))
}
