//! Admin session handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::{info, warn};
use validator::Validate;

use super::auth::{csrf_token, generate_session_token, hash_token, verify_password};
use super::permissions::AdminPermissions;
use super::queries;
use super::types::{AdminProfile, AdminUser, LoginRequest, LoginResponse};
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::ratelimit::ClientIp;

/// Exchange credentials for a session token and its CSRF token.
#[tracing::instrument(skip(state, ip, req), fields(username = %req.username))]
pub async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    req.validate()?;

    let user = queries::find_user_by_username(&state.db, &req.username).await?;
    let Some(user) = user.filter(|u| !u.deactivated) else {
        warn!(ip = %ip.0, "Admin login for unknown or deactivated user");
        return Err(AppError::Unauthorized);
    };
    if !verify_password(&req.password, &user.password_hash) {
        warn!(ip = %ip.0, "Admin login with wrong password");
        return Err(AppError::Unauthorized);
    }

    let token = generate_session_token();
    let session_id =
        queries::create_session(&state.db, user.id, &hash_token(&token), &ip.as_string()).await?;

    // Resolve permissions through the same path the middleware uses
    let session = queries::touch_session(
        &state.db,
        &hash_token(&token),
        state.config.session_idle_secs,
    )
    .await?
    .ok_or(AppError::Unauthorized)?;

    let admin = AdminUser {
        user_id: user.id,
        session_id,
        username: user.username,
        display_name: user.display_name,
        permissions: AdminPermissions::from_db(session.permissions),
    };

    info!(user_id = %admin.user_id, "Admin logged in");
    Ok(Json(LoginResponse {
        csrf_token: csrf_token(&state.config.secret_key, &token),
        token,
        expires_in: state.config.session_idle_secs,
        user: AdminProfile::from(&admin),
    }))
}

/// Revoke the current session.
#[tracing::instrument(skip(state, admin), fields(username = %admin.username))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
) -> AppResult<StatusCode> {
    queries::revoke_session(&state.db, admin.session_id).await?;
    info!(user_id = %admin.user_id, "Admin logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// The authenticated admin and their effective permissions.
pub async fn me(Extension(admin): Extension<AdminUser>) -> Json<AdminProfile> {
    Json(AdminProfile::from(&admin))
}
