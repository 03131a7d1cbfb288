//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BAZAAR_BASE_URL` - Public URL of the storefront (used in emailed links)
//! - `BAZAAR_SESSION_SECRET` - Session signing secret (min 32 chars)
//! - `RAZORPAY_KEY_ID` - Payment gateway key id (sent to the browser checkout)
//! - `RAZORPAY_KEY_SECRET` - Payment gateway API secret (signs payment callbacks)
//! - `RAZORPAY_WEBHOOK_SECRET` - Secret used to sign gateway webhooks
//!
//! ## Optional
//! - `BAZAAR_HOST` - Bind address (default: 127.0.0.1)
//! - `BAZAAR_PORT` - Listen port (default: 3000)
//! - `BAZAAR_CURRENCY` - Store currency (default: INR)
//! - `BAZAAR_FREE_SHIPPING_THRESHOLD` - Subtotal for free shipping (default: 999.00)
//! - `BAZAAR_SHIPPING_FEE` - Flat shipping fee below the threshold (default: 79.00)
//! - `BAZAAR_RESERVATION_TTL_MINUTES` - How long unpaid orders hold stock (default: 30)
//! - `RAZORPAY_API_BASE` - Gateway API base URL (default: <https://api.razorpay.com/v1>)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` - Email delivery
//! - `DELHIVERY_API_TOKEN`, `DELHIVERY_ORIGIN_PINCODE`, `DELHIVERY_API_BASE` - Delivery estimates
//! - `CLOUDINARY_CLOUD_NAME` - Enables image transformation URLs
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error tracking
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use bazaar_core::CurrencyCode;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Pricing, shipping and reservation rules
    pub checkout: CheckoutConfig,
    /// Payment gateway credentials
    pub payment: PaymentConfig,
    /// SMTP configuration (email is disabled when absent)
    pub email: Option<EmailConfig>,
    /// Courier API configuration (static estimates when absent)
    pub shipping: Option<ShippingConfig>,
    /// Image CDN configuration (URLs pass through when absent)
    pub images: Option<ImageConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
}

/// Checkout rules.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Store currency
    pub currency: CurrencyCode,
    /// Subtotal at or above which shipping is free
    pub free_shipping_threshold: Decimal,
    /// Flat shipping fee below the threshold
    pub shipping_fee: Decimal,
    /// How long an unpaid order keeps its stock reserved
    pub reservation_ttl_minutes: i64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::Inr,
            free_shipping_threshold: Decimal::new(99_900, 2),
            shipping_fee: Decimal::new(7_900, 2),
            reservation_ttl_minutes: 30,
        }
    }
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentConfig {
    /// API base URL
    pub api_base: String,
    /// Public key id (safe to expose in browser)
    pub key_id: String,
    /// API secret (server-side only, also signs payment callbacks)
    pub key_secret: SecretString,
    /// Webhook signing secret
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// SMTP email configuration.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Courier (delivery estimate) API configuration.
#[derive(Clone)]
pub struct ShippingConfig {
    pub api_base: String,
    pub api_token: SecretString,
    /// Warehouse pincode that parcels ship from
    pub origin_pincode: String,
}

impl std::fmt::Debug for ShippingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingConfig")
            .field("api_base", &self.api_base)
            .field("api_token", &"[REDACTED]")
            .field("origin_pincode", &self.origin_pincode)
            .finish()
    }
}

/// Image CDN configuration.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Cloudinary cloud name
    pub cloud_name: String,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BAZAAR_DATABASE_URL")?;
        let host = parse_env("BAZAAR_HOST", "127.0.0.1")?;
        let port = parse_env("BAZAAR_PORT", "3000")?;
        let base_url = get_required_env("BAZAAR_BASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        let session_secret = get_required_secret("BAZAAR_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "BAZAAR_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            checkout: CheckoutConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
            email: EmailConfig::from_env()?,
            shipping: ShippingConfig::from_env(),
            images: get_optional_env("CLOUDINARY_CLOUD_NAME")
                .map(|cloud_name| ImageConfig { cloud_name }),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            json_logs: get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            currency: parse_env("BAZAAR_CURRENCY", defaults.currency.code())?,
            free_shipping_threshold: parse_env(
                "BAZAAR_FREE_SHIPPING_THRESHOLD",
                &defaults.free_shipping_threshold.to_string(),
            )?,
            shipping_fee: parse_env("BAZAAR_SHIPPING_FEE", &defaults.shipping_fee.to_string())?,
            reservation_ttl_minutes: parse_env(
                "BAZAAR_RESERVATION_TTL_MINUTES",
                &defaults.reservation_ttl_minutes.to_string(),
            )?,
        };

        if config.reservation_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BAZAAR_RESERVATION_TTL_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }
        if config.shipping_fee.is_sign_negative() || config.free_shipping_threshold.is_sign_negative()
        {
            return Err(ConfigError::InvalidEnvVar(
                "BAZAAR_SHIPPING_FEE".to_string(),
                "shipping amounts cannot be negative".to_string(),
            ));
        }

        Ok(config)
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("RAZORPAY_API_BASE", "https://api.razorpay.com/v1"),
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            webhook_secret: get_validated_secret("RAZORPAY_WEBHOOK_SECRET")?,
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
        }))
    }
}

impl ShippingConfig {
    fn from_env() -> Option<Self> {
        let api_token = get_optional_env("DELHIVERY_API_TOKEN")?;
        let origin_pincode = get_optional_env("DELHIVERY_ORIGIN_PINCODE")?;

        Some(Self {
            api_base: get_env_or_default("DELHIVERY_API_BASE", "https://track.delhivery.com"),
            api_token: SecretString::from(api_token),
            origin_pincode,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A complete config for tests that never touches the environment.
    pub(crate) fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/bazaar_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            checkout: CheckoutConfig::default(),
            payment: PaymentConfig {
                api_base: "http://127.0.0.1:9/v1".to_string(),
                key_id: "rzp_test_key".to_string(),
                key_secret: SecretString::from("key_secret_for_tests"),
                webhook_secret: SecretString::from("webhook_secret_for_tests"),
            },
            email: None,
            shipping: None,
            images: None,
            sentry_dsn: None,
            sentry_environment: None,
            json_logs: false,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-razorpay-secret", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_checkout_defaults() {
        let checkout = CheckoutConfig::default();
        assert_eq!(checkout.currency, CurrencyCode::Inr);
        assert_eq!(checkout.free_shipping_threshold.to_string(), "999.00");
        assert_eq!(checkout.shipping_fee.to_string(), "79.00");
        assert_eq!(checkout.reservation_ttl_minutes, 30);
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let mut config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());

        config.base_url = "https://shop.example.in".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_payment_config_debug_redacts_secrets() {
        let config = test_config().payment;
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("rzp_test_key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("key_secret_for_tests"));
        assert!(!debug_output.contains("webhook_secret_for_tests"));
    }
}
