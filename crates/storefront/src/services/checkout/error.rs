//! Checkout and order lifecycle errors.

use thiserror::Error;

use bazaar_core::{OrderStatus, PriceError};

use crate::db::RepositoryError;
use crate::services::payments::PaymentError;

/// Errors from placing, paying for and managing orders.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to check out.
    #[error("cart is empty")]
    EmptyCart,

    /// Address does not exist or belongs to someone else.
    #[error("address not found")]
    AddressNotFound,

    /// A cart line points at an archived product.
    #[error("{product} is no longer available")]
    ProductUnavailable { product: String },

    /// Stock ran out between adding to cart and checkout.
    #[error("only {available} of {product} ({size}) left in stock")]
    OutOfStock {
        product: String,
        size: String,
        available: i32,
    },

    /// Order does not exist or belongs to someone else.
    #[error("order not found")]
    OrderNotFound,

    /// Payment callback signature or order reference did not match.
    #[error("payment verification failed")]
    InvalidSignature,

    /// Webhook signature missing or wrong.
    #[error("invalid webhook signature")]
    InvalidWebhookSignature,

    /// Signed webhook body that is not a gateway event.
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),

    /// The customer can no longer cancel this order.
    #[error("orders that are {0} cannot be cancelled")]
    NotCancellable(OrderStatus),

    /// The requested status change is not allowed.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Shipping needs a tracking number.
    #[error("tracking number is required to ship")]
    TrackingRequired,

    /// Tracking number failed validation.
    #[error("{0}")]
    InvalidTracking(String),

    /// A paid order has no gateway payment to refund.
    #[error("order has no captured payment to refund")]
    MissingPayment,

    /// Order total cannot be expressed in minor units.
    #[error("invalid order amount: {0}")]
    Amount(#[from] PriceError),

    /// Payment gateway call failed.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] PaymentError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}
