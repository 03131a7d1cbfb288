//! Checkout handlers.
//!
//! `POST /api/checkout` reserves stock and opens a gateway order. The
//! browser completes payment in the gateway widget and posts the signed
//! result to `POST /api/checkout/verify`.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use bazaar_core::OrderId;

use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::checkout::{
    CheckoutService, CheckoutSession, PaymentOutcome, PlaceOrderInput, VerifyPaymentInput,
};
use crate::services::payments::RazorpayClient;
use crate::state::AppState;

pub(crate) fn checkout(state: &AppState) -> CheckoutService<'_, RazorpayClient> {
    CheckoutService::new(
        state.pool(),
        state.gateway(),
        &state.config().checkout,
        state.products(),
        state.mailer(),
    )
}

/// `POST /api/checkout/verify` response.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub order_id: OrderId,
    pub outcome: PaymentOutcome,
}

/// Place an order for the cart.
///
/// POST /api/checkout
///
/// # Errors
///
/// Returns 400 for an empty cart, 404 for an unknown address, 409 when a
/// product is archived or short on stock and 502 when the gateway order
/// cannot be created.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<PlaceOrderInput>,
) -> Result<(StatusCode, Json<CheckoutSession>), AppError> {
    let session = checkout(&state)
        .place_order(user.id, body.address_id, Utc::now())
        .await?;

    let order_id = session.order_id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", &order_id)]));

    Ok((StatusCode::CREATED, Json(session)))
}

/// Confirm a payment from the gateway widget callback.
///
/// POST /api/checkout/verify
///
/// # Errors
///
/// Returns 400 when the signature does not verify and 404 when the order
/// does not belong to the caller.
#[instrument(skip(state, user, body), fields(user_id = %user.id, order_id = %body.order_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<VerifyPaymentInput>,
) -> Result<Json<VerifyResponse>, AppError> {
    let outcome = checkout(&state).verify_payment(user.id, &body).await?;
    Ok(Json(VerifyResponse {
        order_id: body.order_id,
        outcome,
    }))
}
