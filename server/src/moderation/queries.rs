//! Ban and Banword Queries

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::types::{Ban, Banword};
use crate::db::db_error;

// ============================================================================
// Bans
// ============================================================================

/// Active bans whose scope is global or one of `scopes`.
///
/// CIDR containment is checked by the caller.
pub async fn list_effective_bans(
    pool: &PgPool,
    scopes: &[String],
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<Ban>> {
    sqlx::query_as::<_, Ban>(
        r"SELECT * FROM bans
          WHERE active
            AND (active_until IS NULL OR active_until > $1)
            AND (scope IS NULL OR scope = ANY($2))
          ORDER BY created_at DESC",
    )
    .bind(now)
    .bind(scopes)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_effective_bans"))
}

/// Every ban, newest first.
pub async fn list_bans(pool: &PgPool, active_only: bool) -> sqlx::Result<Vec<Ban>> {
    sqlx::query_as::<_, Ban>(
        r"SELECT * FROM bans
          WHERE NOT $1 OR (active AND (active_until IS NULL OR active_until > NOW()))
          ORDER BY created_at DESC",
    )
    .bind(active_only)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_bans"))
}

pub async fn find_ban(pool: &PgPool, id: i64) -> sqlx::Result<Option<Ban>> {
    sqlx::query_as::<_, Ban>("SELECT * FROM bans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_ban", ban_id = id))
}

/// Insert a ban. `active_until` is computed from `duration_days` against the
/// row's own `created_at`.
pub async fn create_ban(
    pool: &PgPool,
    ip_address: &str,
    description: Option<&str>,
    duration_days: Option<i64>,
    scope: Option<&str>,
    active: bool,
) -> sqlx::Result<Ban> {
    sqlx::query_as::<_, Ban>(
        r"INSERT INTO bans (ip_address, description, scope, active, active_until)
          VALUES ($1, $2, $3, $4,
                  CASE WHEN COALESCE($5, 0) > 0
                       THEN NOW() + make_interval(days => $5::int)
                  END)
          RETURNING *",
    )
    .bind(ip_address)
    .bind(description)
    .bind(scope)
    .bind(active)
    .bind(duration_days)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_ban", ip_address = %ip_address))
}

/// Persist every mutable column of `ban`.
pub async fn save_ban(pool: &PgPool, ban: &Ban) -> sqlx::Result<Ban> {
    sqlx::query_as::<_, Ban>(
        r"UPDATE bans
          SET ip_address = $2, description = $3, active_until = $4, scope = $5,
              active = $6, updated_at = NOW()
          WHERE id = $1
          RETURNING *",
    )
    .bind(ban.id)
    .bind(&ban.ip_address)
    .bind(&ban.description)
    .bind(ban.active_until)
    .bind(&ban.scope)
    .bind(ban.active)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_ban", ban_id = ban.id))
}

// ============================================================================
// Banwords
// ============================================================================

/// Active banwords whose scope is global or exactly `scope`.
pub async fn list_effective_banwords(
    pool: &PgPool,
    scope: Option<&str>,
) -> sqlx::Result<Vec<Banword>> {
    sqlx::query_as::<_, Banword>(
        r"SELECT * FROM banwords
          WHERE active AND (scope IS NULL OR scope = $1)
          ORDER BY id",
    )
    .bind(scope)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_effective_banwords"))
}

pub async fn list_banwords(pool: &PgPool, active_only: bool) -> sqlx::Result<Vec<Banword>> {
    sqlx::query_as::<_, Banword>(
        r"SELECT * FROM banwords
          WHERE NOT $1 OR active
          ORDER BY created_at DESC",
    )
    .bind(active_only)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_banwords"))
}

pub async fn find_banword(pool: &PgPool, id: i64) -> sqlx::Result<Option<Banword>> {
    sqlx::query_as::<_, Banword>("SELECT * FROM banwords WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_banword", banword_id = id))
}

pub async fn create_banword(
    pool: &PgPool,
    expr: &str,
    description: Option<&str>,
    scope: Option<&str>,
    active: bool,
) -> sqlx::Result<Banword> {
    sqlx::query_as::<_, Banword>(
        r"INSERT INTO banwords (expr, description, scope, active)
          VALUES ($1, $2, $3, $4)
          RETURNING *",
    )
    .bind(expr)
    .bind(description)
    .bind(scope)
    .bind(active)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_banword"))
}

pub async fn save_banword(pool: &PgPool, banword: &Banword) -> sqlx::Result<Banword> {
    sqlx::query_as::<_, Banword>(
        r"UPDATE banwords
          SET expr = $2, description = $3, scope = $4, active = $5, updated_at = NOW()
          WHERE id = $1
          RETURNING *",
    )
    .bind(banword.id)
    .bind(&banword.expr)
    .bind(&banword.description)
    .bind(&banword.scope)
    .bind(banword.active)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_banword", banword_id = banword.id))
}
