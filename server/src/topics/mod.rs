//! Topics
//!
//! Threads within a board, each with a denormalized counter row.

pub mod handlers;
pub mod queries;
pub mod types;
pub mod writer;

use axum::routing::{delete, get, patch};
use axum::Router;

use crate::api::AppState;
use crate::{posts, tasks};

pub use types::{CreateTopicRequest, Topic, TopicStatus, UpdateTopicRequest};
pub use writer::TopicWriter;

/// Public topic routes (mounted at `/api/1.0/topics`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_recent_topics))
        .route("/{id}", get(handlers::get_topic))
        .route(
            "/{id}/posts",
            get(posts::handlers::list_posts).post(tasks::handlers::submit_post),
        )
        .route("/{id}/posts/{range}", get(posts::handlers::list_posts_range))
}

/// Admin topic routes (mounted at `/api/1.0/admin/topics`).
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            patch(handlers::update_topic).delete(handlers::delete_topic),
        )
        .route(
            "/{id}/posts",
            axum::routing::post(posts::handlers::admin_create_post),
        )
        .route("/{id}/posts/{range}", delete(posts::handlers::delete_posts))
}
