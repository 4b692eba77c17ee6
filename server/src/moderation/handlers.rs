//! Admin handlers for ban and banword rules.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::types::{
    active_until_from, BanResponse, Banword, CreateBanRequest, CreateBanwordRequest,
    UpdateBanRequest, UpdateBanwordRequest,
};
use super::{parse_network, queries, validate_regex};
use crate::admin::{AdminPermissions, AdminUser};
use crate::api::AppState;
use crate::error::{AppError, AppResult};

/// Listing filter.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Only rules currently in effect.
    #[serde(default)]
    pub active: bool,
}

/// Empty scope strings mean "global".
fn normalize_scope(scope: Option<String>) -> Option<String> {
    scope
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Bans
// ============================================================================

#[tracing::instrument(skip(state, admin))]
pub async fn list_bans(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<BanResponse>>> {
    admin.require(AdminPermissions::MANAGE_BANS)?;
    let bans = queries::list_bans(&state.db, params.active).await?;
    Ok(Json(bans.into_iter().map(Into::into).collect()))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn create_ban(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Json(req): Json<CreateBanRequest>,
) -> AppResult<(StatusCode, Json<BanResponse>)> {
    admin.require(AdminPermissions::MANAGE_BANS)?;
    req.validate()?;

    let network = parse_network(&req.ip_address)?;
    let scope = normalize_scope(req.scope);
    let ban = queries::create_ban(
        &state.db,
        &network.to_string(),
        req.description.as_deref(),
        req.duration,
        scope.as_deref(),
        req.active,
    )
    .await?;

    info!(ban_id = ban.id, network = %network, "Ban created");
    Ok((StatusCode::CREATED, Json(ban.into())))
}

/// Update a ban. A new `duration` is counted from the ban's creation.
#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn update_ban(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBanRequest>,
) -> AppResult<Json<BanResponse>> {
    admin.require(AdminPermissions::MANAGE_BANS)?;
    req.validate()?;

    let mut ban = queries::find_ban(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("ban"))?;

    if let Some(ip_address) = req.ip_address {
        ban.ip_address = parse_network(&ip_address)?.to_string();
    }
    if let Some(description) = req.description {
        ban.description = Some(description).filter(|d| !d.is_empty());
    }
    if let Some(days) = req.duration {
        ban.active_until = active_until_from(ban.created_at, Some(days));
    }
    if req.scope.is_some() {
        ban.scope = normalize_scope(req.scope);
    }
    if let Some(active) = req.active {
        ban.active = active;
    }

    let ban = queries::save_ban(&state.db, &ban).await?;
    info!(ban_id = ban.id, "Ban updated");
    Ok(Json(ban.into()))
}

// ============================================================================
// Banwords
// ============================================================================

#[tracing::instrument(skip(state, admin))]
pub async fn list_banwords(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Banword>>> {
    admin.require(AdminPermissions::MANAGE_BANWORDS)?;
    Ok(Json(queries::list_banwords(&state.db, params.active).await?))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn create_banword(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Json(req): Json<CreateBanwordRequest>,
) -> AppResult<(StatusCode, Json<Banword>)> {
    admin.require(AdminPermissions::MANAGE_BANWORDS)?;
    req.validate()?;
    validate_regex(&req.expr)?;

    let scope = normalize_scope(req.scope);
    let banword = queries::create_banword(
        &state.db,
        &req.expr,
        req.description.as_deref(),
        scope.as_deref(),
        req.active,
    )
    .await?;
    state.banwords.invalidate();

    info!(banword_id = banword.id, "Banword created");
    Ok((StatusCode::CREATED, Json(banword)))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn update_banword(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBanwordRequest>,
) -> AppResult<Json<Banword>> {
    admin.require(AdminPermissions::MANAGE_BANWORDS)?;
    req.validate()?;

    let mut banword = queries::find_banword(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("banword"))?;

    if let Some(expr) = req.expr {
        validate_regex(&expr)?;
        banword.expr = expr;
    }
    if let Some(description) = req.description {
        banword.description = Some(description).filter(|d| !d.is_empty());
    }
    if req.scope.is_some() {
        banword.scope = normalize_scope(req.scope);
    }
    if let Some(active) = req.active {
        banword.active = active;
    }

    let banword = queries::save_banword(&state.db, &banword).await?;
    state.banwords.invalidate();

    info!(banword_id = banword.id, "Banword updated");
    Ok(Json(banword))
}
