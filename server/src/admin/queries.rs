//! Admin user, group and session queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::permissions::AdminPermissions;
use crate::db::db_error;

/// Admin account row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub deactivated: bool,
    pub created_at: DateTime<Utc>,
}

/// Live session joined with its user and effective permissions.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub permissions: i64,
}

pub async fn find_user_by_username(pool: &PgPool, username: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_username", username = %username))
}

pub async fn count_users(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(db_error!("count_users"))
}

/// Create a user already holding `password_hash`.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    display_name: &str,
    password_hash: &str,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        r"INSERT INTO users (id, username, display_name, password_hash)
          VALUES ($1, $2, $3, $4)
          RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(username)
    .bind(display_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_user", username = %username))
}

/// Create a group, or update the permissions of an existing one.
pub async fn upsert_group(
    pool: &PgPool,
    name: &str,
    permissions: AdminPermissions,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        r"INSERT INTO groups (name, permissions) VALUES ($1, $2)
          ON CONFLICT (name) DO UPDATE SET permissions = EXCLUDED.permissions
          RETURNING id",
    )
    .bind(name)
    .bind(permissions.to_db())
    .fetch_one(pool)
    .await
    .map_err(db_error!("upsert_group", name = %name))
}

pub async fn add_user_to_group(pool: &PgPool, user_id: Uuid, group_id: i64) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO user_groups (user_id, group_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(group_id)
    .execute(pool)
    .await
    .map_err(db_error!("add_user_to_group", user_id = %user_id, group_id = group_id))?;
    Ok(())
}

pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    ip_address: &str,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar(
        r"INSERT INTO user_sessions (id, user_id, token_hash, ip_address)
          VALUES ($1, $2, $3, $4)
          RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(token_hash)
    .bind(ip_address)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_session", user_id = %user_id))
}

/// Resolve a token digest to a live session and slide its idle window.
///
/// Sessions that are revoked, idle longer than `idle_secs`, or owned by a
/// deactivated user do not resolve.
pub async fn touch_session(
    pool: &PgPool,
    token_hash: &str,
    idle_secs: i64,
) -> sqlx::Result<Option<SessionRecord>> {
    sqlx::query_as::<_, SessionRecord>(
        r"WITH live AS (
              UPDATE user_sessions s
              SET last_seen_at = NOW()
              FROM users u
              WHERE s.token_hash = $1
                AND s.user_id = u.id
                AND s.revoked_at IS NULL
                AND NOT u.deactivated
                AND s.last_seen_at > NOW() - make_interval(secs => $2)
              RETURNING s.id AS session_id, u.id AS user_id, u.username, u.display_name
          )
          SELECT live.session_id, live.user_id, live.username, live.display_name,
                 COALESCE((
                     SELECT BIT_OR(g.permissions)
                     FROM user_groups ug
                     JOIN groups g ON g.id = ug.group_id
                     WHERE ug.user_id = live.user_id
                 ), 0)::BIGINT AS permissions
          FROM live",
    )
    .bind(token_hash)
    .bind(idle_secs as f64)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("touch_session"))
}

pub async fn revoke_session(pool: &PgPool, session_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("UPDATE user_sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL")
        .bind(session_id)
        .execute(pool)
        .await
        .map_err(db_error!("revoke_session", session_id = %session_id))?;
    Ok(())
}
