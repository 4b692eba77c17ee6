//! Admin setting handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use tracing::info;

use super::is_known;
use crate::admin::types::{SettingResponse, UpdateSettingRequest};
use crate::admin::{AdminPermissions, AdminUser};
use crate::api::AppState;
use crate::error::{AppError, AppResult};

/// Every known setting with its resolved value.
#[tracing::instrument(skip(state, admin))]
pub async fn list_settings(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
) -> AppResult<Json<Vec<SettingResponse>>> {
    admin.require(AdminPermissions::MANAGE_SETTINGS)?;

    let settings = state.settings.list_all().await?;
    Ok(Json(
        settings
            .into_iter()
            .map(|(key, value)| SettingResponse { key, value })
            .collect(),
    ))
}

#[tracing::instrument(skip(state, admin))]
pub async fn get_setting(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(key): Path<String>,
) -> AppResult<Json<SettingResponse>> {
    admin.require(AdminPermissions::MANAGE_SETTINGS)?;

    let value = state.settings.value_from_key(&key, true, true).await?;
    Ok(Json(SettingResponse { key, value }))
}

/// Replace a setting. Only keys with a built-in default are writable.
#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn update_setting(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> AppResult<Json<SettingResponse>> {
    admin.require(AdminPermissions::MANAGE_SETTINGS)?;

    if !is_known(&key) {
        return Err(AppError::NotFound("setting"));
    }
    state.settings.update(&key, req.value.clone()).await?;

    info!(key = %key, "Setting updated");
    Ok(Json(SettingResponse {
        key,
        value: req.value,
    }))
}
