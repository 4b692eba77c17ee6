//! Submission and task polling handlers.
//!
//! Submissions are validated, ban-checked and rate-checked synchronously,
//! then queued. The worker runs the slow filters and the write; clients poll
//! `GET /tasks/{uid}` for the outcome.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use fb_common::TaskEnvelope;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use super::dispatcher::is_valid_uid;
use super::types::{Task, TaskHandle, TaskKind, TaskResult};
use crate::api::extract::JsonOrForm;
use crate::api::AppState;
use crate::boards::{self, Board};
use crate::error::{AppError, AppResult};
use crate::moderation::board_scope;
use crate::posts::{self, CreatePostRequest};
use crate::ratelimit::limiter::Limit;
use crate::ratelimit::{submission_key, ClientIp};
use crate::topics::{self, CreateTopicRequest};

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Outcome of charging the cooldown for a task that is already queued.
///
/// The task runs regardless, so a failed charge is logged rather than
/// reported to the client.
fn settle_cooldown<E: std::fmt::Display>(uid: &str, charged: Result<u64, E>) -> Option<u64> {
    match charged {
        Ok(ttl) => Some(ttl),
        Err(e) => {
            warn!(uid, error = %e, "Failed to start submission cooldown");
            None
        }
    }
}

/// Checks shared by every submission, then enqueue and start the cooldown.
async fn admit(
    state: &AppState,
    board: &Board,
    ip: ClientIp,
    headers: &HeaderMap,
    kind: TaskKind,
) -> AppResult<(StatusCode, Json<TaskHandle>)> {
    if let Some(ban) = state
        .bans
        .matching_ban(ip.0, &[board_scope(&board.slug)])
        .await?
    {
        info!(ban_id = ban.id, "Submission from banned address");
        return Err(AppError::BanRejected {
            description: ban.description,
        });
    }

    let ip_address = ip.as_string();
    let key = submission_key(&ip_address, &board.slug);
    if state.rate_limiter.is_limited(&key).await? {
        let time_left = state.rate_limiter.time_left(&key).await?;
        return Err(AppError::RateLimited { time_left });
    }

    let settings = board.settings_over(state.settings.board_defaults().await?);
    let limit = Limit {
        expiration: settings.post_delay,
        threshold: settings.post_delay_threshold,
        period: settings.post_delay_period,
    };

    let task = Task::new(
        kind,
        ip_address,
        header_string(headers, header::USER_AGENT),
        header_string(headers, header::REFERER),
    );
    state.tasks.enqueue(&task).await?;

    let ttl = settle_cooldown(&task.uid, state.rate_limiter.limit_for(limit, &key).await);

    info!(uid = %task.uid, ttl = ?ttl, "Submission queued");
    Ok((StatusCode::ACCEPTED, Json(TaskHandle::new(task.uid))))
}

/// Queue a new topic on a board.
#[tracing::instrument(skip(state, ip, headers, req), fields(ip = %ip.0))]
pub async fn submit_topic(
    State(state): State<AppState>,
    ip: ClientIp,
    Path(slug): Path<String>,
    headers: HeaderMap,
    JsonOrForm(req): JsonOrForm<CreateTopicRequest>,
) -> AppResult<(StatusCode, Json<TaskHandle>)> {
    req.validate()?;

    let board = boards::queries::find_by_slug(&state.db, &slug)
        .await?
        .ok_or(AppError::NotFound("board"))?;

    let kind = TaskKind::CreateTopic {
        board: board.slug.clone(),
        title: req.title,
        body: req.body,
    };
    admit(&state, &board, ip, &headers, kind).await
}

/// Queue a reply to a topic.
#[tracing::instrument(skip(state, ip, headers, req), fields(ip = %ip.0))]
pub async fn submit_post(
    State(state): State<AppState>,
    ip: ClientIp,
    Path(topic_id): Path<i64>,
    headers: HeaderMap,
    JsonOrForm(req): JsonOrForm<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<TaskHandle>)> {
    req.validate()?;

    let topic = topics::queries::find(&state.db, topic_id)
        .await?
        .ok_or(AppError::NotFound("topic"))?;
    let mut conn = state.db.acquire().await?;
    let board = boards::queries::find_by_id_in(&mut conn, topic.board_id)
        .await?
        .ok_or(AppError::NotFound("board"))?;
    drop(conn);

    let kind = TaskKind::CreatePost {
        board: board.slug.clone(),
        topic_id,
        body: req.body,
        bumped: req.bumped,
    };
    admit(&state, &board, ip, &headers, kind).await
}

/// Poll response for a task.
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outcome of a queued submission.
///
/// Pending tasks answer `status: "pending"`. Finished tasks answer with the
/// created entity, or with the error the worker recorded.
#[tracing::instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<TaskStatusResponse>> {
    if !is_valid_uid(&uid) {
        return Err(AppError::NotFound("task"));
    }

    let envelope = match state.tasks.result_from_uid(&uid).await? {
        TaskResult::Pending => {
            return Ok(Json(TaskStatusResponse {
                kind: "task",
                id: uid,
                status: "pending",
                data: None,
            }))
        }
        TaskResult::Done(envelope) => envelope,
    };

    let (tag, id) = match envelope {
        TaskEnvelope::Success { tag, id } => (tag, id),
        TaskEnvelope::Failure { reason, extra } => {
            return Err(AppError::from_failure(reason, extra.as_ref()));
        }
    };

    let data = match tag.as_str() {
        "topic" => topics::queries::find(&state.db, id)
            .await?
            .ok_or(AppError::NotFound("topic"))
            .map(|topic| serde_json::to_value(topic))?,
        "post" => posts::queries::find(&state.db, id)
            .await?
            .ok_or(AppError::NotFound("post"))
            .map(|post| serde_json::to_value(post))?,
        other => {
            return Err(AppError::Internal(format!(
                "Unknown task result tag: {other}"
            )))
        }
    }
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(TaskStatusResponse {
        kind: "task",
        id: uid,
        status: "success",
        data: Some(data),
    }))
}
