//! Post Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use fb_common::PostRange;
use tracing::info;
use validator::Validate;

use super::queries;
use super::types::{NewPost, Post, PostAuthor};
use crate::admin::types::{AdminPostRequest, DeletedResponse};
use crate::admin::{AdminPermissions, AdminUser};
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::ratelimit::ClientIp;
use crate::topics;

/// Unparseable range tokens read as a missing resource.
fn parse_range(token: Option<&str>) -> AppResult<PostRange> {
    PostRange::parse_opt(token).map_err(|_| AppError::NotFound("post"))
}

async fn ensure_topic(state: &AppState, topic_id: i64) -> AppResult<()> {
    topics::queries::find(&state.db, topic_id)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("topic"))
}

async fn posts_in_range(
    state: &AppState,
    topic_id: i64,
    token: Option<&str>,
) -> AppResult<Vec<Post>> {
    let range = parse_range(token)?;
    ensure_topic(state, topic_id).await?;
    Ok(queries::list_by_topic(&state.db, topic_id, &range).await?)
}

/// Every post of a topic.
#[tracing::instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    Path(topic_id): Path<i64>,
) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(posts_in_range(&state, topic_id, None).await?))
}

/// Posts of a topic selected by a range token (`5`, `2-9`, `-10`, `40-`,
/// `recent`, `l50`).
#[tracing::instrument(skip(state))]
pub async fn list_posts_range(
    State(state): State<AppState>,
    Path((topic_id, range)): Path<(i64, String)>,
) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(posts_in_range(&state, topic_id, Some(&range)).await?))
}

// ============================================================================
// Admin
// ============================================================================

/// Reply as staff. Bypasses the task queue and the filter chain.
#[tracing::instrument(skip(state, admin, ip, req), fields(admin = %admin.username))]
pub async fn admin_create_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    ip: ClientIp,
    Path(topic_id): Path<i64>,
    Json(req): Json<AdminPostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    admin.require(AdminPermissions::POST_AS_STAFF)?;
    req.validate()?;

    let new = NewPost {
        body: req.body,
        bumped: req.bumped,
        ip_address: ip.as_string(),
        author: Some(PostAuthor {
            name: admin.display_name.clone(),
            ident: admin.username.clone(),
        }),
    };
    let post = state.posts.create(topic_id, new).await?;

    info!(topic_id, number = post.number, "Staff post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// Delete the posts of a topic selected by a range token. Ranges that
/// include the opening post are refused with `not_found`.
#[tracing::instrument(skip(state, admin), fields(admin = %admin.username))]
pub async fn delete_posts(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path((topic_id, range)): Path<(i64, String)>,
) -> AppResult<Json<DeletedResponse>> {
    admin.require(AdminPermissions::MANAGE_POSTS)?;

    let range = parse_range(Some(&range))?;
    ensure_topic(&state, topic_id).await?;

    let deleted = queries::delete_range(&state.db, topic_id, &range)
        .await?
        .ok_or(AppError::NotFound("post"))?;

    info!(topic_id, deleted, "Posts deleted");
    Ok(Json(DeletedResponse { deleted }))
}
