//! Razorpay API client.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::CurrencyCode;

use super::signature;
use super::{
    GatewayOrder, GatewayRefund, PaymentError, PaymentGateway, WebhookEvent, WebhookEventKind,
};
use crate::config::PaymentConfig;

/// Request timeout for gateway calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Razorpay REST client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

impl RazorpayClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, PaymentError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| format!("{}: {}", b.error.code, b.error.description))
                .unwrap_or(text);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    #[instrument(skip(self), fields(receipt = %receipt))]
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let body = serde_json::json!({
            "amount": amount_minor,
            "currency": currency.code(),
            "receipt": receipt,
        });
        self.post("/orders", &body).await
    }

    #[instrument(skip(self))]
    async fn refund(
        &self,
        payment_id: &str,
        amount_minor: i64,
    ) -> Result<GatewayRefund, PaymentError> {
        let body = serde_json::json!({ "amount": amount_minor });
        let path = format!("/payments/{}/refund", urlencoding::encode(payment_id));
        self.post(&path, &body).await
    }

    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool {
        signature::verify_payment_signature(
            self.key_secret.expose_secret(),
            gateway_order_id,
            payment_id,
            signature,
        )
    }

    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        signature::verify_webhook_signature(self.webhook_secret.expose_secret(), body, signature)
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent, PaymentError> {
        parse_webhook(body)
    }
}

// =============================================================================
// Webhook payloads
// =============================================================================

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    payload: RawPayload,
}

#[derive(Default, Deserialize)]
struct RawPayload {
    payment: Option<Wrapped<RawPayment>>,
    order: Option<Wrapped<RawOrder>>,
}

#[derive(Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Deserialize)]
struct RawPayment {
    id: String,
    order_id: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct RawOrder {
    id: String,
}

/// Parse a Razorpay webhook body.
///
/// # Errors
///
/// Returns `PaymentError::Parse` for malformed JSON or a handled event
/// missing its payment or order id.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let raw: RawEvent =
        serde_json::from_slice(body).map_err(|e| PaymentError::Parse(e.to_string()))?;

    let payment = raw.payload.payment.map(|p| p.entity);
    let order_id = raw
        .payload
        .order
        .map(|o| o.entity.id)
        .or_else(|| payment.as_ref().and_then(|p| p.order_id.clone()));

    let missing = |what: &str| PaymentError::Parse(format!("{} event without {what}", raw.event));

    let kind = match raw.event.as_str() {
        "payment.captured" | "order.paid" => {
            let payment = payment.ok_or_else(|| missing("payment"))?;
            WebhookEventKind::Paid {
                gateway_order_id: order_id.ok_or_else(|| missing("order id"))?,
                payment_id: payment.id,
            }
        }
        "payment.failed" => {
            let payment = payment.ok_or_else(|| missing("payment"))?;
            WebhookEventKind::PaymentFailed {
                gateway_order_id: order_id.ok_or_else(|| missing("order id"))?,
                payment_id: payment.id,
                reason: payment.error_description,
            }
        }
        _ => WebhookEventKind::Ignored,
    };

    Ok(WebhookEvent {
        event_type: raw.event,
        kind,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payment_captured() {
        let body = br#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_29QQoUBi66xm2f",
                        "amount": 129900,
                        "currency": "INR",
                        "status": "captured",
                        "order_id": "order_9A33XWu170gUtm"
                    }
                }
            }
        }"#;
        let event = parse_webhook(body).unwrap();
        assert_eq!(event.event_type, "payment.captured");
        assert_eq!(
            event.kind,
            WebhookEventKind::Paid {
                gateway_order_id: "order_9A33XWu170gUtm".to_string(),
                payment_id: "pay_29QQoUBi66xm2f".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_order_paid_prefers_order_entity() {
        let body = br#"{
            "event": "order.paid",
            "payload": {
                "payment": { "entity": { "id": "pay_1", "order_id": null } },
                "order": { "entity": { "id": "order_1", "status": "paid" } }
            }
        }"#;
        let event = parse_webhook(body).unwrap();
        assert_eq!(
            event.kind,
            WebhookEventKind::Paid {
                gateway_order_id: "order_1".to_string(),
                payment_id: "pay_1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_payment_failed_keeps_reason() {
        let body = br#"{
            "event": "payment.failed",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_2",
                        "order_id": "order_2",
                        "error_description": "Payment declined by bank"
                    }
                }
            }
        }"#;
        let event = parse_webhook(body).unwrap();
        assert_eq!(
            event.kind,
            WebhookEventKind::PaymentFailed {
                gateway_order_id: "order_2".to_string(),
                payment_id: "pay_2".to_string(),
                reason: Some("Payment declined by bank".to_string()),
            }
        );
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let event = parse_webhook(br#"{"event":"refund.processed","payload":{}}"#).unwrap();
        assert_eq!(event.kind, WebhookEventKind::Ignored);
    }

    #[test]
    fn test_captured_without_order_id_is_an_error() {
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_3"}}}}"#;
        assert!(matches!(parse_webhook(body), Err(PaymentError::Parse(_))));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(parse_webhook(b"not json"), Err(PaymentError::Parse(_))));
    }
}
