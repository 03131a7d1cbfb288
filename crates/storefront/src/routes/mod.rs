//! HTTP route handlers for the Bazaar JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness
//! GET  /health/ready                         - Readiness (database ping)
//!
//! # Auth (strict rate limit)
//! POST /api/auth/register                    - Create account and sign in
//! POST /api/auth/login                       - Password sign in
//! POST /api/auth/logout                      - Sign out
//! POST /api/auth/magic-link                  - Email a sign-in link (always 202)
//! GET  /api/auth/magic-link/verify?token=    - Redeem a sign-in link
//! GET  /api/auth/me                          - Current session user
//!
//! # Catalog
//! GET  /api/products                         - Listing with filters and sort
//! GET  /api/products/{slug}                  - Product page
//! GET  /api/categories                       - Categories with counts
//! GET  /api/products/{slug}/reviews          - Reviews and rating summary
//! PUT|DELETE /api/products/{slug}/reviews/mine
//!
//! # Cart and wishlist (signed in)
//! GET|DELETE /api/cart                       - Show or clear the cart
//! GET  /api/cart/count                       - Badge count
//! POST|PATCH|DELETE /api/cart/items          - Add, set quantity, remove
//! GET  /api/wishlist
//! POST /api/wishlist/items
//! DELETE /api/wishlist/items/{product_id}
//! POST /api/wishlist/items/{product_id}/move-to-cart
//!
//! # Addresses, checkout and orders (signed in)
//! GET|POST /api/addresses
//! PUT|DELETE /api/addresses/{id}
//! POST /api/addresses/{id}/default
//! POST /api/checkout                         - Reserve stock, open gateway order
//! POST /api/checkout/verify                  - Confirm widget payment
//! GET  /api/orders
//! GET  /api/orders/{id}
//! POST /api/orders/{id}/cancel
//! GET  /api/shipping/estimate?pincode=
//!
//! # Gateway (signature checked, not rate limited)
//! POST /api/webhooks/razorpay
//!
//! # Admin
//! /api/admin/...                             - See [`admin`]
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod shipping;
pub mod webhooks;
pub mod wishlist;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/magic-link", post(auth::request_magic_link))
        .route("/magic-link/verify", get(auth::verify_magic_link))
        .route("/me", get(auth::me))
}

/// Create the catalog and review routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
        .route("/{slug}/reviews", get(reviews::index))
        .route(
            "/{slug}/reviews/mine",
            put(reviews::upsert_mine).delete(reviews::delete_mine),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/count", get(cart::count))
        .route(
            "/items",
            post(cart::add).patch(cart::update).delete(cart::remove),
        )
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/items", post(wishlist::add))
        .route("/items/{product_id}", delete(wishlist::remove))
        .route("/items/{product_id}/move-to-cart", post(wishlist::move_to_cart))
}

/// Create the account routes router (addresses, checkout, orders).
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(addresses::index).post(addresses::create))
        .route(
            "/addresses/{id}",
            put(addresses::update).delete(addresses::delete),
        )
        .route("/addresses/{id}/default", post(addresses::set_default))
        .route("/checkout", post(checkout::place_order))
        .route("/checkout/verify", post(checkout::verify_payment))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/cancel", post(orders::cancel))
}

/// Create all `/api` routes.
///
/// Auth routes carry the strict limiter, everything else the relaxed one.
/// The webhook is merged after the limiters so gateway retries are never
/// throttled.
pub fn api_routes() -> Router<AppState> {
    let limited = Router::new()
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/products", product_routes())
        .route("/categories", get(products::categories))
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .merge(account_routes())
        .route("/shipping/estimate", get(shipping::estimate))
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter());

    limited.route("/webhooks/razorpay", post(webhooks::razorpay))
}

/// Create all routes for the service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::tests::test_config;

    fn app() -> Router {
        let config = test_config();
        let pool = crate::db::create_lazy_pool(&config.database_url).unwrap();
        let state = AppState::new(config, pool).unwrap();
        crate::app(state)
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.10")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_sets_security_headers() {
        let response = app()
            .oneshot(request("GET", "/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = app()
            .oneshot(
                request("GET", "/health")
                    .header("x-request-id", "edge-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "edge-42");
    }

    #[tokio::test]
    async fn test_me_requires_login() {
        let response = app()
            .oneshot(request("GET", "/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Please sign in");
    }

    #[tokio::test]
    async fn test_cart_requires_login() {
        let response = app()
            .oneshot(request("GET", "/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_requires_login() {
        let response = app()
            .oneshot(
                request("GET", "/api/admin/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhooks/razorpay")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(webhooks::SIGNATURE_HEADER, "00ff")
                    .body(Body::from(r#"{"event":"payment.captured"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "invalid webhook signature");
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhooks/razorpay")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_magic_link_rejects_malformed_email() {
        let response = app()
            .oneshot(
                request("POST", "/api/auth/magic-link")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"email":"not-an-email"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid email address");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .oneshot(request("GET", "/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
