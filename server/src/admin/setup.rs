//! First-run setup.
//!
//! `setup.version` stays null until the first admin account exists. The
//! bootstrap creates that account in an `administrators` group holding every
//! permission, then records the schema version it was created under.

use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use super::auth::hash_password;
use super::permissions::AdminPermissions;
use super::queries;
use crate::error::AppResult;
use crate::settings::SettingStore;

/// Version written to `setup.version` by the bootstrap.
pub const SETUP_VERSION: i64 = 1;

/// Group the bootstrap admin joins.
pub const ADMIN_GROUP: &str = "administrators";

/// Whether the bootstrap has already run.
pub async fn is_setup_complete(settings: &SettingStore) -> AppResult<bool> {
    Ok(!settings.get("setup.version").await?.is_null())
}

/// Create the first admin account unless setup already ran.
///
/// Returns whether an account was created.
#[tracing::instrument(skip(pool, settings, password))]
pub async fn bootstrap(
    pool: &PgPool,
    settings: &SettingStore,
    username: &str,
    password: &str,
) -> AppResult<bool> {
    if is_setup_complete(settings).await? {
        return Ok(false);
    }

    let group_id = queries::upsert_group(pool, ADMIN_GROUP, AdminPermissions::all()).await?;
    let user = match queries::find_user_by_username(pool, username).await? {
        Some(user) => user,
        None => {
            let hash = hash_password(password)?;
            queries::create_user(pool, username, username, &hash).await?
        }
    };
    queries::add_user_to_group(pool, user.id, group_id).await?;
    settings.update("setup.version", json!(SETUP_VERSION)).await?;

    info!(user_id = %user.id, "Initial admin account created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::admin::auth::verify_password;

    #[sqlx::test]
    async fn test_bootstrap_runs_once(pool: PgPool) {
        let settings = SettingStore::new(pool.clone(), Duration::from_secs(60));
        assert!(!is_setup_complete(&settings).await.unwrap());

        assert!(bootstrap(&pool, &settings, "admin", "correct horse").await.unwrap());
        assert!(is_setup_complete(&settings).await.unwrap());

        let user = queries::find_user_by_username(&pool, "admin")
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("correct horse", &user.password_hash));

        assert!(!bootstrap(&pool, &settings, "other", "pw").await.unwrap());
        assert_eq!(queries::count_users(&pool).await.unwrap(), 1);
    }
}
