//! Boards
//!
//! Top-level containers for topics. Each board carries a status and a
//! settings mapping merged over built-in defaults.

pub mod handlers;
pub mod queries;
pub mod types;

use axum::routing::{get, patch};
use axum::Router;

use crate::api::AppState;
use crate::{tasks, topics};

pub use types::{Board, BoardResponse, BoardSettings, BoardStatus};

/// Public board routes (mounted at `/api/1.0/boards`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_boards))
        .route("/{slug}", get(handlers::get_board))
        .route(
            "/{slug}/topics",
            get(topics::handlers::list_board_topics).post(tasks::handlers::submit_topic),
        )
        .route(
            "/{slug}/topics/recent",
            get(topics::handlers::list_recent_board_topics),
        )
}

/// Admin board routes (mounted at `/api/1.0/admin/boards`).
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::admin_list_boards).post(handlers::create_board),
        )
        .route("/{slug}", patch(handlers::update_board))
        .route(
            "/{slug}/topics",
            get(topics::handlers::admin_list_board_topics).post(topics::handlers::admin_create_topic),
        )
}
