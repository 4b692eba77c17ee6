//! Topic Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;
use validator::Validate;

use super::queries;
use super::types::{Topic, UpdateTopicRequest};
use crate::admin::types::AdminTopicRequest;
use crate::admin::{AdminPermissions, AdminUser};
use crate::api::AppState;
use crate::boards;
use crate::db::{self, LOCK_SEED_TOPIC_POST_NUMBER};
use crate::error::{AppError, AppResult};
use crate::posts::{NewPost, PostAuthor};
use crate::ratelimit::ClientIp;

async fn ensure_board(state: &AppState, slug: &str) -> AppResult<()> {
    boards::queries::find_by_slug(&state.db, slug)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("board"))
}

/// Open and locked topics of a board, most recently bumped first.
#[tracing::instrument(skip(state))]
pub async fn list_board_topics(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<Topic>>> {
    ensure_board(&state, &slug).await?;
    Ok(Json(
        queries::list_active_from_board_slug(&state.db, &slug).await?,
    ))
}

/// The first page of a board's topic list.
#[tracing::instrument(skip(state))]
pub async fn list_recent_board_topics(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<Topic>>> {
    ensure_board(&state, &slug).await?;
    Ok(Json(
        queries::list_recent_from_board_slug(&state.db, &slug).await?,
    ))
}

/// Most recently bumped topics across every listed board.
#[tracing::instrument(skip(state))]
pub async fn list_recent_topics(State(state): State<AppState>) -> AppResult<Json<Vec<Topic>>> {
    Ok(Json(queries::list_recent(&state.db).await?))
}

#[tracing::instrument(skip(state))]
pub async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Topic>> {
    let topic = queries::find(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("topic"))?;
    Ok(Json(topic))
}

// ============================================================================
// Admin
// ============================================================================

/// Every non-expired topic of a board, archived included.
#[tracing::instrument(skip(state, admin))]
pub async fn admin_list_board_topics(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<Topic>>> {
    admin.require(AdminPermissions::MANAGE_TOPICS)?;
    ensure_board(&state, &slug).await?;
    Ok(Json(queries::list_from_board_slug(&state.db, &slug).await?))
}

/// Open a topic as staff. Bypasses the task queue and the filter chain.
#[tracing::instrument(skip(state, admin, ip, req), fields(admin = %admin.username))]
pub async fn admin_create_topic(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    ip: ClientIp,
    Path(slug): Path<String>,
    Json(req): Json<AdminTopicRequest>,
) -> AppResult<(StatusCode, Json<Topic>)> {
    admin.require(AdminPermissions::POST_AS_STAFF)?;
    req.validate()?;

    let new = NewPost {
        body: req.body,
        bumped: true,
        ip_address: ip.as_string(),
        author: Some(PostAuthor {
            name: admin.display_name.clone(),
            ident: admin.username.clone(),
        }),
    };
    let topic = state.topics.create(&slug, &req.title, new).await?;

    info!(topic_id = topic.id, board = %slug, "Staff topic created");
    Ok((StatusCode::CREATED, Json(topic)))
}

#[tracing::instrument(skip(state, admin, req), fields(admin = %admin.username, status = %req.status.as_str()))]
pub async fn update_topic(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTopicRequest>,
) -> AppResult<Json<Topic>> {
    admin.require(AdminPermissions::MANAGE_TOPICS)?;

    let mut tx = state.db.begin().await?;
    db::advisory_xact_lock(&mut tx, id, LOCK_SEED_TOPIC_POST_NUMBER).await?;
    queries::find_in(&mut tx, id)
        .await?
        .ok_or(AppError::NotFound("topic"))?;
    queries::set_status(&mut tx, id, req.status).await?;
    tx.commit().await?;

    let topic = queries::find(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("topic"))?;
    info!(topic_id = id, "Topic status updated");
    Ok(Json(topic))
}

/// Delete a topic with its posts and counters.
#[tracing::instrument(skip(state, admin), fields(admin = %admin.username))]
pub async fn delete_topic(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    admin.require(AdminPermissions::MANAGE_TOPICS)?;

    if !queries::delete(&state.db, id).await? {
        return Err(AppError::NotFound("topic"));
    }
    info!(topic_id = id, "Topic deleted");
    Ok(StatusCode::NO_CONTENT)
}
