//! HMAC-SHA256 signature checks for gateway callbacks and webhooks.
//!
//! Signatures arrive hex encoded. Comparison happens in constant time via
//! `Mac::verify_slice`; malformed hex simply fails verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn verify(secret: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

/// Verify the checkout callback signature over `"{order_id}|{payment_id}"`.
#[must_use]
pub fn verify_payment_signature(
    key_secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature_hex: &str,
) -> bool {
    let message = format!("{gateway_order_id}|{payment_id}");
    verify(key_secret.as_bytes(), message.as_bytes(), signature_hex)
}

/// Verify a webhook signature over the raw request body.
#[must_use]
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature_hex: &str) -> bool {
    verify(webhook_secret.as_bytes(), body, signature_hex)
}

/// Hex HMAC-SHA256 of `message`, as the gateway computes it.
#[must_use]
pub fn sign(secret: &str, message: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}
