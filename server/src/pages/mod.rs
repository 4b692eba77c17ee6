//! Static and internal pages.
//!
//! Public pages are listed and served to everyone. Internal pages hold site
//! fragments (stylesheet, footer, appendix) and are only reachable through
//! the admin API, restricted to a fixed slug whitelist.

pub mod constants;
pub mod format;
pub mod handlers;
pub mod queries;
pub mod types;

use axum::routing::get;
use axum::Router;

use crate::api::AppState;

pub use constants::{internal_formatter, INTERNAL_PAGES};
pub use types::{Page, PageFormatter, PageNamespace, PageResponse};

/// Public page routes (mounted at `/api/1.0/pages`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_pages))
        .route("/{slug}", get(handlers::get_page))
}

/// Admin page routes (mounted at `/api/1.0/admin/pages`).
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::admin_list_pages).post(handlers::create_page),
        )
        .route("/internal", get(handlers::list_internal_pages))
        .route(
            "/internal/{*slug}",
            get(handlers::get_internal_page)
                .put(handlers::put_internal_page)
                .delete(handlers::delete_internal_page),
        )
        .route(
            "/public/{slug}",
            axum::routing::patch(handlers::update_page).delete(handlers::delete_page),
        )
}
