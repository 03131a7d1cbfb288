//! Order maintenance commands.
//!
//! The storefront sweeps lapsed reservations every minute. This runs the
//! same sweep once, for when the server is down or during maintenance.

use bazaar_storefront::services::catalog::ProductCache;
use bazaar_storefront::services::checkout::{CheckoutError, expire_reservations};
use chrono::Utc;
use thiserror::Error;

use super::ConnectError;

/// Errors that can occur during order maintenance.
#[derive(Debug, Error)]
pub enum OrdersError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Sweep failed: {0}")]
    Checkout(#[from] CheckoutError),
}

/// Cancel unpaid orders whose reservation has lapsed.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn expire() -> Result<usize, OrdersError> {
    let pool = super::connect().await?;

    // A throwaway cache: the running server's cache expires on its own TTL
    let cache = ProductCache::new();
    let count = expire_reservations(&pool, &cache, Utc::now()).await?;

    tracing::info!(count, "Expired unpaid orders");
    Ok(count)
}
