//! Payment gateway webhooks.
//!
//! The body is taken raw because the signature covers the exact bytes the
//! gateway sent.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::services::checkout::WebhookOutcome;
use crate::state::AppState;

use super::checkout::checkout;

/// Signature over the raw body.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
/// Unique delivery id, used for de-duplication.
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: WebhookOutcome,
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Apply a Razorpay event.
///
/// POST /api/webhooks/razorpay
///
/// # Errors
///
/// Returns 401 for a missing or wrong signature, 400 for an unreadable
/// payload and 404 when the event names an order we do not know, so the
/// gateway retries later.
#[instrument(skip_all, fields(event_id))]
pub async fn razorpay(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let event_id = header(&headers, EVENT_ID_HEADER);
    if let Some(id) = event_id {
        tracing::Span::current().record("event_id", id);
    }

    let status = checkout(&state)
        .handle_webhook(&body, header(&headers, SIGNATURE_HEADER), event_id)
        .await?;

    Ok(Json(WebhookAck { status }))
}
