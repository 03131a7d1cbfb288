//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::catalog::ProductCache;
use crate::services::email::EmailService;
use crate::services::images::ImageTransformer;
use crate::services::payments::{PaymentError, RazorpayClient};
use crate::services::shipping::{ShippingError, ShippingService};

/// Error building the shared clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
    #[error("shipping client: {0}")]
    Shipping(#[from] ShippingError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gateway: RazorpayClient,
    mailer: Option<EmailService>,
    shipping: ShippingService,
    images: ImageTransformer,
    products: ProductCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Email, courier and image integrations are enabled only when their
    /// configuration is present.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client or the SMTP transport cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway = RazorpayClient::new(&config.payment)?;
        let mailer = config.email.as_ref().map(EmailService::new).transpose()?;
        let shipping = ShippingService::new(config.shipping.as_ref())?;
        let images = ImageTransformer::new(config.images.as_ref());

        if mailer.is_none() {
            tracing::warn!("SMTP not configured, emails will be skipped");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                mailer,
                shipping,
                images,
                products: ProductCache::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Payment gateway client.
    #[must_use]
    pub fn gateway(&self) -> &RazorpayClient {
        &self.inner.gateway
    }

    /// Mailer, when SMTP is configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&EmailService> {
        self.inner.mailer.as_ref()
    }

    /// Courier estimate client.
    #[must_use]
    pub fn shipping(&self) -> &ShippingService {
        &self.inner.shipping
    }

    /// Image URL transformer.
    #[must_use]
    pub fn images(&self) -> &ImageTransformer {
        &self.inner.images
    }

    /// Product page cache.
    #[must_use]
    pub fn products(&self) -> &ProductCache {
        &self.inner.products
    }
}
