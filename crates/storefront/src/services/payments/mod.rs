//! Payment gateway integration.
//!
//! Checkout talks to the gateway through [`PaymentGateway`] so the provider
//! can be swapped. [`RazorpayClient`] is the only implementation.

mod razorpay;
pub mod signature;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::CurrencyCode;

pub use razorpay::{RazorpayClient, parse_webhook};

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or webhook payload.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// An order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
}

/// A refund issued by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub amount: i64,
}

/// A webhook event reduced to what checkout acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Gateway event name, e.g. `payment.captured`.
    pub event_type: String,
    pub kind: WebhookEventKind,
}

/// What a webhook event asks checkout to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    /// The payment for a gateway order succeeded.
    Paid {
        gateway_order_id: String,
        payment_id: String,
    },
    /// A payment attempt for a gateway order failed.
    PaymentFailed {
        gateway_order_id: String,
        payment_id: String,
        reason: Option<String>,
    },
    /// Acknowledged without action.
    Ignored,
}

impl WebhookEvent {
    /// Dedup key for deliveries without an event id header.
    #[must_use]
    pub fn fallback_id(&self) -> String {
        match &self.kind {
            WebhookEventKind::Paid { payment_id, .. }
            | WebhookEventKind::PaymentFailed { payment_id, .. } => {
                format!("{}:{payment_id}", self.event_type)
            }
            WebhookEventKind::Ignored => self.event_type.clone(),
        }
    }
}

/// A payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the browser checkout widget.
    fn key_id(&self) -> &str;

    /// Create a gateway order for `amount_minor` minor units.
    fn create_order(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        receipt: &str,
    ) -> impl Future<Output = Result<GatewayOrder, PaymentError>> + Send;

    /// Refund `amount_minor` of a captured payment.
    fn refund(
        &self,
        payment_id: &str,
        amount_minor: i64,
    ) -> impl Future<Output = Result<GatewayRefund, PaymentError>> + Send;

    /// Check the signature the client receives after a successful payment.
    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> bool;

    /// Check a webhook body against its signature header.
    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool;

    /// Parse a verified webhook body.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` if the body is not a gateway event.
    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_id_uses_payment_id() {
        let event = WebhookEvent {
            event_type: "payment.failed".to_string(),
            kind: WebhookEventKind::PaymentFailed {
                gateway_order_id: "order_A".to_string(),
                payment_id: "pay_B".to_string(),
                reason: None,
            },
        };
        assert_eq!(event.fallback_id(), "payment.failed:pay_B");

        let ignored = WebhookEvent {
            event_type: "refund.created".to_string(),
            kind: WebhookEventKind::Ignored,
        };
        assert_eq!(ignored.fallback_id(), "refund.created");
    }
}
