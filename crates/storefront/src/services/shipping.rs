//! Delivery-time estimates from the courier API.
//!
//! Estimates are cached per destination pincode for an hour. Without a
//! courier configured, or when the courier call fails, a static window is
//! returned instead.

use std::time::Duration;

use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use bazaar_core::Pincode;

use crate::config::ShippingConfig;

/// Cached estimates live this long.
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Maximum cached pincodes.
const CACHE_CAPACITY: u64 = 10_000;

/// Request timeout for courier calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Fallback delivery window in days.
const DEFAULT_MIN_DAYS: u32 = 5;
const DEFAULT_MAX_DAYS: u32 = 7;

/// Errors from the courier API.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response did not contain an estimate.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Where an estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Courier,
    Default,
}

/// Expected delivery window for a pincode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingEstimate {
    pub pincode: Pincode,
    pub min_days: u32,
    pub max_days: u32,
    pub source: EstimateSource,
}

impl ShippingEstimate {
    fn default_for(pincode: Pincode) -> Self {
        Self {
            pincode,
            min_days: DEFAULT_MIN_DAYS,
            max_days: DEFAULT_MAX_DAYS,
            source: EstimateSource::Default,
        }
    }
}

#[derive(Deserialize)]
struct TatResponse {
    data: Option<TatData>,
}

#[derive(Deserialize)]
struct TatData {
    tat: Option<u32>,
}

/// Courier client with a per-pincode cache.
#[derive(Clone)]
pub struct ShippingService {
    courier: Option<Courier>,
    cache: Cache<String, ShippingEstimate>,
}

#[derive(Clone)]
struct Courier {
    client: reqwest::Client,
    api_base: String,
    api_token: secrecy::SecretString,
    origin_pincode: String,
}

impl ShippingService {
    /// Create the service. `None` disables courier lookups.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: Option<&ShippingConfig>) -> Result<Self, ShippingError> {
        let courier = config
            .map(|config| -> Result<Courier, ShippingError> {
                Ok(Courier {
                    client: reqwest::Client::builder()
                        .timeout(REQUEST_TIMEOUT)
                        .build()?,
                    api_base: config.api_base.trim_end_matches('/').to_owned(),
                    api_token: config.api_token.clone(),
                    origin_pincode: config.origin_pincode.clone(),
                })
            })
            .transpose()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self { courier, cache })
    }

    /// Delivery estimate for a destination pincode.
    ///
    /// Courier failures are logged and answered with the default window,
    /// which is not cached.
    #[instrument(skip(self), fields(pincode = %pincode))]
    pub async fn estimate(&self, pincode: &Pincode) -> ShippingEstimate {
        let Some(courier) = &self.courier else {
            return ShippingEstimate::default_for(pincode.clone());
        };

        if let Some(cached) = self.cache.get(pincode.as_str()).await {
            return cached;
        }

        match courier.expected_days(pincode).await {
            Ok(days) => {
                let estimate = ShippingEstimate {
                    pincode: pincode.clone(),
                    min_days: days,
                    max_days: days.saturating_add(1),
                    source: EstimateSource::Courier,
                };
                self.cache
                    .insert(pincode.as_str().to_owned(), estimate.clone())
                    .await;
                estimate
            }
            Err(e) => {
                tracing::warn!(error = %e, "Courier estimate failed, using default window");
                ShippingEstimate::default_for(pincode.clone())
            }
        }
    }
}

impl Courier {
    async fn expected_days(&self, destination: &Pincode) -> Result<u32, ShippingError> {
        let url = format!("{}/api/dc/expected_tat", self.api_base);
        let response = self
            .client
            .get(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.api_token.expose_secret()),
            )
            .query(&[
                ("origin_pin", self.origin_pincode.as_str()),
                ("destination_pin", destination.as_str()),
                ("mot", "S"),
            ])
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShippingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: TatResponse = response
            .json()
            .await
            .map_err(|e| ShippingError::Parse(e.to_string()))?;

        body.data
            .and_then(|d| d.tat)
            .filter(|days| *days > 0)
            .ok_or_else(|| ShippingError::Parse("response has no tat".to_string()))
    }
}
