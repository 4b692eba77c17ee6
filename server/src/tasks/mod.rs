//! Submission Tasks
//!
//! Anonymous topics and replies are admitted asynchronously: the HTTP layer
//! queues a [`Task`], the [`TaskWorker`] runs the filter chain and the write,
//! and the outcome is stored as a [`fb_common::TaskEnvelope`] for polling.

pub mod dispatcher;
pub mod handlers;
pub mod types;
pub mod worker;

use axum::routing::get;
use axum::Router;

use crate::api::AppState;

pub use dispatcher::TaskDispatcher;
pub use types::{Task, TaskHandle, TaskKind, TaskResult};
pub use worker::{supervise, TaskWorker};

/// Task polling routes (mounted at `/api/1.0/tasks`).
pub fn router() -> Router<AppState> {
    Router::new().route("/{uid}", get(handlers::get_task))
}
