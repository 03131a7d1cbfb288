//! Authentication route handlers.
//!
//! Password and magic-link sign in. A successful sign in cycles the session
//! id and stores the [`CurrentUser`] in the session.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthError, AuthService};
use crate::services::email;
use crate::state::AppState;

/// `POST /api/auth/register` payload.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// `POST /api/auth/login` payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/magic-link` payload.
#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
}

/// `GET /api/auth/magic-link/verify` query.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

/// Generic acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

async fn start_session(session: &Session, user: &User) -> Result<(), AppError> {
    set_current_user(session, &user.to_current_user())
        .await
        .map_err(AuthError::from)?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create an account and sign it in.
///
/// POST /api/auth/register
///
/// # Errors
///
/// Returns 400 for an invalid email, password or name and 409 when the
/// email is taken.
#[instrument(skip(state, session, body))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = AuthService::new(state.pool())
        .register(&body.email, &body.password, &body.name)
        .await?;

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "Account registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Sign in with email and password.
///
/// POST /api/auth/login
///
/// # Errors
///
/// Returns 401 for wrong credentials and 403 for a banned account.
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>, AppError> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(user))
}

/// Sign out.
///
/// POST /api/auth/logout
///
/// # Errors
///
/// Returns 500 if the session cannot be deleted.
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session)
        .await
        .map_err(AuthError::from)?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Email a one-time sign-in link.
///
/// POST /api/auth/magic-link
///
/// Always answers 202 for a well-formed email so the response does not
/// reveal whether an account exists.
///
/// # Errors
///
/// Returns 400 for a malformed email.
#[instrument(skip(state, body))]
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(body): Json<MagicLinkRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let link = AuthService::new(state.pool())
        .create_magic_link(&body.email, &state.config().base_url)
        .await?;

    if let Some(link) = link {
        let to = link.user.email.as_str().to_owned();
        let name = link.user.name;
        let url = link.url;
        email::spawn_send(state.mailer(), "magic_link", move |mailer| async move {
            mailer.send_magic_link(&to, &name, &url).await
        });
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(Message {
            message: "If an account exists for that email, a sign-in link is on its way",
        }),
    ))
}

/// Redeem a magic link and sign in.
///
/// GET /api/auth/magic-link/verify?token=...
///
/// # Errors
///
/// Returns 401 when the token is unknown, expired or already used.
#[instrument(skip(state, session, query))]
pub async fn verify_magic_link(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<User>, AppError> {
    let user = AuthService::new(state.pool())
        .consume_magic_link(&query.token)
        .await?;

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in via magic link");

    Ok(Json(user))
}

/// The signed-in user, including who is impersonating them.
///
/// GET /api/auth/me
pub async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}
