//! Moderation
//!
//! Ban rules (CIDR + scope) and banned-word rules (regex + scope), with
//! their query engines and admin endpoints.

pub mod ban;
pub mod banword;
pub mod handlers;
pub mod queries;
pub mod types;

use axum::routing::{get, patch};
use axum::Router;

use crate::api::AppState;

pub use ban::BanEngine;
pub use banword::{validate_regex, BanwordCache, BanwordEngine};
pub use types::{board_scope, parse_network, scope_applies, Ban, Banword};

/// Admin ban routes (mounted at `/api/1.0/admin/bans`).
pub fn bans_router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_bans).post(handlers::create_ban))
        .route("/{id}", patch(handlers::update_ban))
}

/// Admin banword routes (mounted at `/api/1.0/admin/banwords`).
pub fn banwords_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_banwords).post(handlers::create_banword),
        )
        .route("/{id}", patch(handlers::update_banword))
}
