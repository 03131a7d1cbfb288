//! Admin user management and impersonation.
//!
//! Role and ban changes apply from the user's next sign in; existing
//! sessions keep the identity they were created with.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{UserId, UserRole};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::middleware::{RequireAdmin, RequireAuth, set_current_user};
use crate::models::{
    CurrentUser, DEFAULT_PER_PAGE, Impersonator, Page, PageParams, Paginated, User,
};
use crate::models::product::non_empty;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// `GET /api/admin/users` query.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `PUT /api/admin/users/{id}/role` payload.
#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: UserRole,
}

fn not_self(admin: &CurrentUser, target: UserId, action: &str) -> Result<(), AppError> {
    if admin.id == target {
        return Err(AppError::BadRequest(format!("You cannot {action} yourself")));
    }
    Ok(())
}

/// GET /api/admin/users?q=&page=&per_page=
///
/// # Errors
///
/// Returns 401/403 for non-admins.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UserQuery>,
) -> Result<Json<Paginated<User>>, AppError> {
    let page = Page::from_params(
        PageParams {
            page: query.page,
            per_page: query.per_page,
        },
        DEFAULT_PER_PAGE,
    );
    let search = non_empty(query.q.as_deref());
    let (users, total) = UserRepository::new(state.pool())
        .list(search.as_deref(), page)
        .await?;
    Ok(Json(Paginated::new(users, page, total)))
}

/// Change a user's role. Admins cannot demote themselves.
///
/// PUT /api/admin/users/{id}/role
///
/// # Errors
///
/// Returns 400 for self-demotion and 404 for unknown users.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<RoleUpdate>,
) -> Result<Json<User>, AppError> {
    if body.role != UserRole::Admin {
        not_self(&admin, id, "demote")?;
    }
    let user = UserRepository::new(state.pool()).set_role(id, body.role).await?;
    tracing::info!(user_id = %id, role = %body.role, "User role changed");
    Ok(Json(user))
}

/// POST /api/admin/users/{id}/ban
///
/// # Errors
///
/// Returns 400 for self-bans and 404 for unknown users.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn ban(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    not_self(&admin, id, "ban")?;
    let user = UserRepository::new(state.pool()).set_banned(id, true).await?;
    tracing::info!(user_id = %id, "User banned");
    Ok(Json(user))
}

/// POST /api/admin/users/{id}/unban
///
/// # Errors
///
/// Returns 404 for unknown users.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn unban(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::new(state.pool()).set_banned(id, false).await?;
    tracing::info!(user_id = %id, "User unbanned");
    Ok(Json(user))
}

/// Act as another user. Admin routes stay closed until impersonation stops.
///
/// POST /api/admin/users/{id}/impersonate
///
/// # Errors
///
/// Returns 400 when targeting yourself or a banned user and 404 for
/// unknown users.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id))]
pub async fn impersonate(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
) -> Result<Json<CurrentUser>, AppError> {
    not_self(&admin, id, "impersonate")?;
    let target = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if target.banned {
        return Err(AppError::BadRequest("Cannot impersonate a banned user".to_string()));
    }

    let mut acting = target.to_current_user();
    acting.impersonator = Some(Impersonator {
        id: admin.id,
        email: admin.email.clone(),
        name: admin.name.clone(),
    });
    set_current_user(&session, &acting)
        .await
        .map_err(AuthError::from)?;
    set_sentry_user(&acting.id, Some(acting.email.as_str()));

    tracing::warn!(target_user_id = %id, "Admin started impersonating user");
    Ok(Json(acting))
}

/// Return to the admin's own identity.
///
/// POST /api/admin/impersonation/stop
///
/// Reachable by any signed-in session, since an impersonating session is
/// not an admin one.
///
/// # Errors
///
/// Returns 400 when the session is not impersonating and 403 when the
/// admin has since lost the admin role or been banned.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn stop_impersonating(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CurrentUser>, AppError> {
    let Some(impersonator) = user.impersonator else {
        return Err(AppError::BadRequest("Not impersonating anyone".to_string()));
    };

    let admin = UserRepository::new(state.pool())
        .get_by_id(impersonator.id)
        .await?
        .filter(|admin| admin.role == UserRole::Admin && !admin.banned)
        .ok_or_else(|| AppError::Forbidden("Admin access required".to_string()))?;

    let restored = admin.to_current_user();
    set_current_user(&session, &restored)
        .await
        .map_err(AuthError::from)?;
    set_sentry_user(&restored.id, Some(restored.email.as_str()));

    tracing::info!(admin_id = %admin.id, "Impersonation stopped");
    Ok(Json(restored))
}
