//! Setting Queries

use serde_json::Value;
use sqlx::PgPool;

use crate::db::db_error;

/// Stored value for `key`, if a row exists.
pub async fn find_setting(pool: &PgPool, key: &str) -> sqlx::Result<Option<Value>> {
    sqlx::query_scalar::<_, Value>("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_setting", key = %key))
}

/// Insert or replace the value for `key`.
pub async fn upsert_setting(pool: &PgPool, key: &str, value: &Value) -> sqlx::Result<()> {
    sqlx::query(
        r"INSERT INTO settings (key, value) VALUES ($1, $2)
          ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .map_err(db_error!("upsert_setting", key = %key))?;
    Ok(())
}
