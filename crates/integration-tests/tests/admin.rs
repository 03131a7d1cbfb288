//! Integration tests for the admin API.
//!
//! These tests require:
//! - The storefront running
//! - `BAZAAR_ADMIN_EMAIL` and `BAZAAR_ADMIN_PASSWORD` for an account made
//!   with `bazaar admin create`
//!
//! Tests that need the admin account skip themselves when it is not set.
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

use bazaar_integration_tests::{admin_client, api, client, register};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

// ============================================================================
// Access Control
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_customers_cannot_reach_admin() {
    let client = client();
    register(&client).await;

    let resp = client
        .get(api("/admin/dashboard"))
        .send()
        .await
        .expect("Failed to call dashboard");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running server, database and admin credentials"]
async fn test_dashboard_stats() {
    let Some(admin) = admin_client().await else {
        return;
    };

    let stats: Value = admin
        .get(api("/admin/dashboard"))
        .send()
        .await
        .expect("Failed to call dashboard")
        .json()
        .await
        .expect("Failed to parse dashboard");
    assert!(stats["user_count"].as_i64().is_some_and(|n| n >= 1));
    assert!(stats["orders_by_status"].is_array());
}

// ============================================================================
// Catalog Management
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server, database and admin credentials"]
async fn test_product_lifecycle() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let slug = format!("test-tee-{}", Uuid::new_v4().simple());

    let resp = admin
        .post(api("/admin/products"))
        .json(&json!({
            "name": "Test Tee",
            "slug": slug,
            "category": "t-shirts",
            "price": "499.00",
            "stock": [{ "size": "m", "quantity": 3 }],
        }))
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product: Value = resp.json().await.expect("Failed to parse product");
    let id = product["id"].as_i64().expect("product id");
    assert_eq!(product["stock"][0]["size"], "M");

    // Visible to shoppers
    let resp = client()
        .get(api(&format!("/products/{slug}")))
        .send()
        .await
        .expect("Failed to load product");
    assert_eq!(resp.status(), StatusCode::OK);

    let product: Value = admin
        .put(api(&format!("/admin/products/{id}/stock")))
        .json(&json!({ "size": "L", "quantity": 5 }))
        .send()
        .await
        .expect("Failed to set stock")
        .json()
        .await
        .expect("Failed to parse product");
    assert_eq!(product["stock"].as_array().map(Vec::len), Some(2));

    let product: Value = admin
        .post(api(&format!("/admin/products/{id}/archive")))
        .send()
        .await
        .expect("Failed to archive")
        .json()
        .await
        .expect("Failed to parse product");
    assert_eq!(product["is_archived"], true);

    // Hidden from shoppers once archived
    let resp = client()
        .get(api(&format!("/products/{slug}")))
        .send()
        .await
        .expect("Failed to load product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running server, database and admin credentials"]
async fn test_negative_stock_is_rejected() {
    let Some(admin) = admin_client().await else {
        return;
    };

    let listing: Value = admin
        .get(api("/admin/products?per_page=1"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to parse listing");
    let Some(id) = listing["items"][0]["id"].as_i64() else {
        return;
    };

    let resp = admin
        .put(api(&format!("/admin/products/{id}/stock")))
        .json(&json!({ "size": "M", "quantity": -1 }))
        .send()
        .await
        .expect("Failed to set stock");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Users and Impersonation
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server, database and admin credentials"]
async fn test_ban_blocks_login() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let shopper = client();
    let user = register(&shopper).await;
    let id = user["id"].as_i64().expect("user id");

    let banned: Value = admin
        .post(api(&format!("/admin/users/{id}/ban")))
        .send()
        .await
        .expect("Failed to ban")
        .json()
        .await
        .expect("Failed to parse user");
    assert_eq!(banned["banned"], true);

    let resp = client()
        .post(api("/auth/login"))
        .json(&json!({
            "email": user["email"],
            "password": bazaar_integration_tests::TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running server, database and admin credentials"]
async fn test_impersonation_round_trip() {
    let Some(admin) = admin_client().await else {
        return;
    };
    let me: Value = admin
        .get(api("/auth/me"))
        .send()
        .await
        .expect("Failed to call me")
        .json()
        .await
        .expect("Failed to parse me");

    let target = register(&client()).await;
    let target_id = target["id"].as_i64().expect("user id");

    let acting: Value = admin
        .post(api(&format!("/admin/users/{target_id}/impersonate")))
        .send()
        .await
        .expect("Failed to impersonate")
        .json()
        .await
        .expect("Failed to parse session user");
    assert_eq!(acting["id"], target["id"]);
    assert_eq!(acting["impersonator"]["id"], me["id"]);

    // The impersonated session has customer rights only
    let resp = admin
        .get(api("/admin/dashboard"))
        .send()
        .await
        .expect("Failed to call dashboard");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let restored: Value = admin
        .post(api("/admin/impersonation/stop"))
        .send()
        .await
        .expect("Failed to stop impersonating")
        .json()
        .await
        .expect("Failed to parse session user");
    assert_eq!(restored["id"], me["id"]);
    assert!(restored["impersonator"].is_null());
}
