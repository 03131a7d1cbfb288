//! Bazaar storefront library.
//!
//! The JSON API for the shop: catalog, cart, checkout with Razorpay, order
//! history, reviews and the admin API. The binary in `main.rs` adds
//! Sentry, logging and the background reservation sweeper around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, http::Request};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router with its per-request middleware.
///
/// Layers, outermost first: request tracing, request id, security headers,
/// sessions. Rate limits are attached per route group in [`routes`].
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    routes::routes()
        .layer(session_layer)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
