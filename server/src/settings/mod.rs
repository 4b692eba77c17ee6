//! Setting Store
//!
//! Runtime configuration keyed by dotted names (`app.post_delay`,
//! `ext.filters.dnsbl`, ...), read through a TTL cache and backed by the
//! `settings` table with built-in defaults.

pub mod defaults;
pub mod handlers;
pub mod queries;
pub mod store;

use axum::routing::get;
use axum::Router;

use crate::api::AppState;

pub use defaults::{default_for, is_known, DEFAULT_KEYS};
pub use store::{SettingError, SettingStore};

/// Admin setting routes (mounted at `/api/1.0/admin/settings`).
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_settings))
        .route(
            "/{key}",
            get(handlers::get_setting).put(handlers::update_setting),
        )
}
