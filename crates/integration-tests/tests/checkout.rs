//! Integration tests for checkout, orders and the payment webhook.
//!
//! These tests require:
//! - A migrated and seeded database
//! - The storefront running with Razorpay test-mode keys
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

use bazaar_integration_tests::{api, client, in_stock_product, register, sign_webhook};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn add_address(client: &Client) -> i64 {
    let address: Value = client
        .post(api("/addresses"))
        .json(&json!({
            "full_name": "Asha Rao",
            "phone": "9876543210",
            "line1": "12 MG Road",
            "city": "Bengaluru",
            "state": "Karnataka",
            "pincode": "560001",
        }))
        .send()
        .await
        .expect("Failed to create address")
        .json()
        .await
        .expect("Failed to parse address");
    address["id"].as_i64().expect("address id")
}

async fn fill_cart(client: &Client) {
    let (product_id, size) = in_stock_product(client).await;
    let resp = client
        .post(api("/cart/items"))
        .json(&json!({ "product_id": product_id, "size": size, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_empty_cart_cannot_check_out() {
    let client = client();
    register(&client).await;
    let address_id = add_address(&client).await;

    let resp = client
        .post(api("/checkout"))
        .json(&json!({ "address_id": address_id }))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running server, seeded database and Razorpay test keys"]
async fn test_place_and_cancel_order() {
    let client = client();
    register(&client).await;
    let address_id = add_address(&client).await;
    fill_cart(&client).await;

    let resp = client
        .post(api("/checkout"))
        .json(&json!({ "address_id": address_id }))
        .send()
        .await
        .expect("Failed to check out");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let session: Value = resp.json().await.expect("Failed to parse checkout");
    assert!(session["gateway_order_id"].as_str().is_some());
    assert!(session["amount"].as_i64().is_some_and(|paise| paise > 0));
    let order_id = session["order_id"].as_i64().expect("order id");

    // The cart is kept until the payment is confirmed
    let count: Value = client
        .get(api("/cart/count"))
        .send()
        .await
        .expect("Failed to count cart")
        .json()
        .await
        .expect("Failed to parse count");
    assert_eq!(count["count"], 1);

    let order: Value = client
        .get(api(&format!("/orders/{order_id}")))
        .send()
        .await
        .expect("Failed to load order")
        .json()
        .await
        .expect("Failed to parse order");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "pending");

    let cancelled: Value = client
        .post(api(&format!("/orders/{order_id}/cancel")))
        .send()
        .await
        .expect("Failed to cancel")
        .json()
        .await
        .expect("Failed to parse order");
    assert_eq!(cancelled["status"], "cancelled");

    // Cancelling twice is a conflict
    let resp = client
        .post(api(&format!("/orders/{order_id}/cancel")))
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running server, seeded database and Razorpay test keys"]
async fn test_forged_payment_signature_is_rejected() {
    let client = client();
    register(&client).await;
    let address_id = add_address(&client).await;
    fill_cart(&client).await;

    let session: Value = client
        .post(api("/checkout"))
        .json(&json!({ "address_id": address_id }))
        .send()
        .await
        .expect("Failed to check out")
        .json()
        .await
        .expect("Failed to parse checkout");

    let resp = client
        .post(api("/checkout/verify"))
        .json(&json!({
            "order_id": session["order_id"],
            "gateway_order_id": session["gateway_order_id"],
            "gateway_payment_id": "pay_forged",
            "signature": "00".repeat(32),
        }))
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_other_users_orders_are_hidden() {
    let owner = client();
    register(&owner).await;
    let orders: Value = owner
        .get(api("/orders"))
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Failed to parse orders");
    assert_eq!(orders["total"], 0);

    let stranger = client();
    register(&stranger).await;
    let resp = stranger
        .get(api(&format!("/orders/{}", i32::MAX)))
        .send()
        .await
        .expect("Failed to load order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Webhook and Shipping
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server, seeded database, Razorpay test keys and webhook secret"]
async fn test_webhook_redelivery_is_acknowledged_once() {
    let client = client();
    register(&client).await;
    let address_id = add_address(&client).await;
    fill_cart(&client).await;

    let session: Value = client
        .post(api("/checkout"))
        .json(&json!({ "address_id": address_id }))
        .send()
        .await
        .expect("Failed to check out")
        .json()
        .await
        .expect("Failed to parse checkout");
    let order_id = session["order_id"].as_i64().expect("order id");

    let payment_id = format!("pay_{}", uuid::Uuid::new_v4().simple());
    let body = json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": { "id": payment_id, "order_id": session["gateway_order_id"] }
            }
        }
    })
    .to_string();
    let Some(signature) = sign_webhook(body.as_bytes()) else {
        return;
    };
    let event_id = format!("evt_{}", uuid::Uuid::new_v4().simple());

    let mut statuses = Vec::new();
    for _ in 0..2 {
        let ack: Value = client
            .post(api("/webhooks/razorpay"))
            .header("x-razorpay-signature", &signature)
            .header("x-razorpay-event-id", &event_id)
            .body(body.clone())
            .send()
            .await
            .expect("Failed to post webhook")
            .json()
            .await
            .expect("Failed to parse acknowledgement");
        statuses.push(ack["status"].clone());
    }
    assert_eq!(statuses, [json!("processed"), json!("duplicate")]);

    let order: Value = client
        .get(api(&format!("/orders/{order_id}")))
        .send()
        .await
        .expect("Failed to load order")
        .json()
        .await
        .expect("Failed to parse order");
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["payment_status"], "paid");

    // Cleared once the payment lands
    let count: Value = client
        .get(api("/cart/count"))
        .send()
        .await
        .expect("Failed to count cart")
        .json()
        .await
        .expect("Failed to parse count");
    assert_eq!(count["count"], 0);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_webhook_requires_valid_signature() {
    let resp = client()
        .post(api("/webhooks/razorpay"))
        .header("x-razorpay-signature", "deadbeef")
        .body(r#"{"event":"payment.captured","payload":{}}"#)
        .send()
        .await
        .expect("Failed to post webhook");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_shipping_estimate() {
    let client = client();

    let estimate: Value = client
        .get(api("/shipping/estimate?pincode=560001"))
        .send()
        .await
        .expect("Failed to estimate")
        .json()
        .await
        .expect("Failed to parse estimate");
    assert!(estimate["min_days"].as_u64().is_some());

    let resp = client
        .get(api("/shipping/estimate?pincode=abc"))
        .send()
        .await
        .expect("Failed to estimate");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
