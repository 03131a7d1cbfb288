//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an admin with a generated password (printed once)
//! bazaar admin create -e admin@example.com -n "Admin Name"
//!
//! # Promote an account that already signed up
//! bazaar admin promote -e someone@example.com
//! ```

use bazaar_core::{Email, EmailError, UserRole};
use bazaar_storefront::db::{RepositoryError, UserRepository};
use bazaar_storefront::models::User;
use bazaar_storefront::services::auth::{AuthError, hash_password};
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

use super::ConnectError;

/// Length of generated admin passwords.
const GENERATED_PASSWORD_LEN: usize = 20;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] AuthError),

    #[error("No account with email: {0}")]
    UnknownUser(String),
}

/// Create an admin account, or promote the account if the email is taken.
///
/// A fresh account gets a random password that is printed once.
///
/// # Errors
///
/// Returns an error for an invalid email or a database failure.
pub async fn create_user(email: &str, name: &str) -> Result<User, AdminError> {
    let email = Email::parse(email)?;
    let pool = super::connect().await?;
    let users = UserRepository::new(&pool);

    if let Some(existing) = users.get_by_email(&email).await? {
        tracing::warn!(%email, "Account already exists, promoting instead");
        return Ok(users.set_role(existing.id, UserRole::Admin).await?);
    }

    let password = generate_password();
    let hash = hash_password(&password)?;
    let user = users.create_with_password(&email, name.trim(), &hash).await?;
    let user = users.set_role(user.id, UserRole::Admin).await?;

    tracing::info!(user_id = %user.id, %email, "Admin account created");

    #[allow(clippy::print_stdout)]
    {
        println!("Admin account created for {email}");
        println!("Password (shown once): {password}");
    }

    Ok(user)
}

/// Give an existing account the admin role.
///
/// Takes effect at the account's next sign in.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if no account has the email.
pub async fn promote(email: &str) -> Result<User, AdminError> {
    let email = Email::parse(email)?;
    let pool = super::connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UnknownUser(email.to_string()))?;

    let user = users.set_role(user.id, UserRole::Admin).await?;
    tracing::info!(user_id = %user.id, %email, "Account promoted to admin");
    Ok(user)
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}
