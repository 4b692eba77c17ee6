//! Admin Module
//!
//! Session-authenticated endpoints for staff:
//! - Login/logout with argon2 password hashes and sliding-idle sessions
//! - Board, topic, post, ban, banword, page and setting management
//! - Staff posting through the regular topic/post writer
//!
//! Every route except `/login` requires a live session. Writes also require
//! the session's CSRF token.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod permissions;
pub mod queries;
pub mod setup;
pub mod types;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::api::AppState;
use crate::{boards, moderation, pages, settings, topics};

pub use middleware::require_admin;
pub use permissions::AdminPermissions;
pub use types::AdminUser;

/// Create the admin router (mounted at `/api/1.0/admin`).
pub fn router(state: AppState) -> Router<AppState> {
    let session_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        .nest("/boards", boards::admin_router())
        .nest("/topics", topics::admin_router())
        .nest("/bans", moderation::bans_router())
        .nest("/banwords", moderation::banwords_router())
        .nest("/pages", pages::admin_router())
        .nest("/settings", settings::admin_router())
        .layer(from_fn_with_state(state, require_admin));

    Router::new()
        .route("/login", post(handlers::login))
        .merge(session_routes)
}
