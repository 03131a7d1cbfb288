//! Admin API. Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin)
//! except `impersonation/stop`, which an impersonated session must reach.

pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::state::AppState;

/// Routes mounted under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::show))
        // Catalog
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", patch(products::update))
        .route("/products/{id}/archive", post(products::archive))
        .route("/products/{id}/unarchive", post(products::unarchive))
        .route("/products/{id}/stock", put(products::set_stock))
        .route("/products/{id}/stock/{size}", delete(products::delete_size))
        // Users
        .route("/users", get(users::index))
        .route("/users/{id}/role", put(users::set_role))
        .route("/users/{id}/ban", post(users::ban))
        .route("/users/{id}/unban", post(users::unban))
        .route("/users/{id}/impersonate", post(users::impersonate))
        .route("/impersonation/stop", post(users::stop_impersonating))
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/orders/{id}/tracking", put(orders::set_tracking))
        // Reviews
        .route("/reviews/{id}", delete(reviews::delete))
}
