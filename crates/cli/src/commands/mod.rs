//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod orders;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;

/// Environment variable names checked for the database URL, in order.
const DATABASE_URL_VARS: [&str; 2] = ["BAZAAR_DATABASE_URL", "DATABASE_URL"];

/// Load `.env` and read the database URL.
///
/// Returns `None` when neither variable is set.
pub fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();

    DATABASE_URL_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|url| !url.is_empty()))
        .map(SecretString::from)
}

/// Connect to the database named by the environment.
///
/// # Errors
///
/// Returns `ConnectError::MissingDatabaseUrl` when no URL is configured, or
/// the database error when the connection fails.
pub async fn connect() -> Result<PgPool, ConnectError> {
    let url = database_url().ok_or(ConnectError::MissingDatabaseUrl)?;
    tracing::info!("Connecting to database...");
    Ok(bazaar_storefront::db::create_pool(&url).await?)
}

/// Errors that can occur while connecting.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Neither database URL variable is set.
    #[error("Missing environment variable: BAZAAR_DATABASE_URL")]
    MissingDatabaseUrl,

    /// Connection failed.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
