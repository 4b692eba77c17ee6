//! Board Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::Value;
use tracing::info;
use validator::Validate;

use super::queries;
use super::types::{BoardResponse, CreateBoardRequest, UpdateBoardRequest};
use crate::admin::{AdminPermissions, AdminUser};
use crate::api::AppState;
use crate::error::{AppError, AppResult};

/// List boards that are not archived.
#[tracing::instrument(skip(state))]
pub async fn list_boards(State(state): State<AppState>) -> AppResult<Json<Vec<BoardResponse>>> {
    let boards = queries::list_active(&state.db).await?;
    let base = state.settings.board_defaults().await?;
    Ok(Json(boards.into_iter().map(|b| BoardResponse::new(b, &base)).collect()))
}

#[tracing::instrument(skip(state))]
pub async fn get_board(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<BoardResponse>> {
    let board = queries::find_by_slug(&state.db, &slug)
        .await?
        .ok_or(AppError::NotFound("board"))?;
    let base = state.settings.board_defaults().await?;
    Ok(Json(BoardResponse::new(board, &base)))
}

// ============================================================================
// Admin
// ============================================================================

/// Every board, archived included.
#[tracing::instrument(skip(state, admin))]
pub async fn admin_list_boards(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
) -> AppResult<Json<Vec<BoardResponse>>> {
    admin.require(AdminPermissions::MANAGE_BOARDS)?;
    let boards = queries::list_all(&state.db).await?;
    let base = state.settings.board_defaults().await?;
    Ok(Json(boards.into_iter().map(|b| BoardResponse::new(b, &base)).collect()))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username, slug = %req.slug))]
pub async fn create_board(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Json(req): Json<CreateBoardRequest>,
) -> AppResult<(StatusCode, Json<BoardResponse>)> {
    admin.require(AdminPermissions::MANAGE_BOARDS)?;
    req.validate()?;

    if queries::find_by_slug(&state.db, &req.slug).await?.is_some() {
        return Err(AppError::invalid("slug", "This slug is already taken."));
    }

    let board = queries::create(
        &state.db,
        &req.slug,
        &req.title,
        req.description.as_deref(),
        req.agreements.as_deref(),
        req.status,
        &Value::Object(req.settings),
    )
    .await?;

    info!(board_id = board.id, "Board created");
    let base = state.settings.board_defaults().await?;
    Ok((StatusCode::CREATED, Json(BoardResponse::new(board, &base))))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username))]
pub async fn update_board(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(slug): Path<String>,
    Json(req): Json<UpdateBoardRequest>,
) -> AppResult<Json<BoardResponse>> {
    admin.require(AdminPermissions::MANAGE_BOARDS)?;
    req.validate()?;

    let mut board = queries::find_by_slug(&state.db, &slug)
        .await?
        .ok_or(AppError::NotFound("board"))?;

    if let Some(title) = req.title {
        board.title = title;
    }
    if let Some(description) = req.description {
        board.description = Some(description).filter(|d| !d.is_empty());
    }
    if let Some(agreements) = req.agreements {
        board.agreements = Some(agreements).filter(|a| !a.is_empty());
    }
    if let Some(status) = req.status {
        board.status = status;
    }
    if let Some(settings) = req.settings {
        board.settings = Value::Object(settings);
    }

    let board = queries::save(&state.db, &board).await?;
    info!(board_id = board.id, status = %board.status, "Board updated");
    let base = state.settings.board_defaults().await?;
    Ok(Json(BoardResponse::new(board, &base)))
}
