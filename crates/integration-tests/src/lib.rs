//! End-to-end tests for the Bazaar API.
//!
//! The tests talk to a running storefront over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! bazaar migrate
//! bazaar seed products -f catalog.yaml
//! cargo run -p bazaar-storefront &
//! cargo test -p bazaar-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `BAZAAR_BASE_URL` - storefront URL (default `http://localhost:3000`)
//! - `BAZAAR_ADMIN_EMAIL` / `BAZAAR_ADMIN_PASSWORD` - an account created with
//!   `bazaar admin create`, used by the admin tests
//! - `RAZORPAY_WEBHOOK_SECRET` - the server's webhook secret, used to sign
//!   webhook deliveries

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Storefront base URL.
#[must_use]
pub fn base_url() -> String {
    std::env::var("BAZAAR_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned())
}

/// `{base_url}/api{path}`.
#[must_use]
pub fn api(path: &str) -> String {
    format!("{}/api{path}", base_url())
}

/// A cookie-keeping client with its own forwarded client address.
///
/// The sign-in routes are rate limited per address, so every client gets a
/// distinct one.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    let bytes = Uuid::new_v4().into_bytes();
    let [a, b, c, ..] = bytes;
    let ip = format!("10.{a}.{b}.{c}");

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&ip).expect("forwarded address is a valid header"),
    );

    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// A fresh address that no account uses yet.
#[must_use]
pub fn unique_email() -> String {
    format!("shopper-{}@example.com", Uuid::new_v4().simple())
}

/// Register a new shopper on `client`, leaving it signed in.
///
/// # Panics
///
/// Panics if registration fails.
pub async fn register(client: &Client) -> Value {
    let resp = client
        .post(api("/auth/register"))
        .json(&json!({
            "email": unique_email(),
            "password": TEST_PASSWORD,
            "name": "Test Shopper",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to parse user")
}

/// Sign in as the operator account named by the environment.
///
/// Returns `None` when the admin credentials are not configured.
///
/// # Panics
///
/// Panics if the credentials are set but rejected.
pub async fn admin_client() -> Option<Client> {
    let email = std::env::var("BAZAAR_ADMIN_EMAIL").ok()?;
    let password = std::env::var("BAZAAR_ADMIN_PASSWORD").ok()?;

    let client = client();
    let resp = client
        .post(api("/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in as admin");
    assert_eq!(resp.status(), StatusCode::OK, "admin login rejected");

    Some(client)
}

/// First in-stock product and one of its in-stock sizes.
///
/// # Panics
///
/// Panics if the catalog has nothing in stock.
pub async fn in_stock_product(client: &Client) -> (i64, String) {
    let listing: Value = client
        .get(api("/products?per_page=50"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to parse listing");

    let slug = listing["items"]
        .as_array()
        .and_then(|items| items.iter().find(|p| p["in_stock"] == true))
        .and_then(|p| p["slug"].as_str())
        .expect("catalog has no in-stock products; run `bazaar seed products`")
        .to_owned();

    let detail: Value = client
        .get(api(&format!("/products/{slug}")))
        .send()
        .await
        .expect("Failed to load product")
        .json()
        .await
        .expect("Failed to parse product");

    let id = detail["id"].as_i64().expect("product id");
    let size = detail["sizes"]
        .as_array()
        .and_then(|sizes| sizes.iter().find(|s| s["in_stock"] == true))
        .and_then(|s| s["size"].as_str())
        .expect("in-stock product has an in-stock size")
        .to_owned();

    (id, size)
}

/// Sign `body` the way Razorpay signs webhooks.
///
/// Returns `None` when `RAZORPAY_WEBHOOK_SECRET` is not set.
///
/// # Panics
///
/// Panics if the HMAC cannot be keyed.
#[must_use]
pub fn sign_webhook(body: &[u8]) -> Option<String> {
    let secret = std::env::var("RAZORPAY_WEBHOOK_SECRET").ok()?;
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}
