//! Read-through setting cache.
//!
//! The cache is process-local. A write invalidates only this process's entry;
//! other processes may serve the old value until their TTL lapses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, warn};

use super::defaults::{default_for, is_known, DEFAULT_KEYS};
use super::queries;
use crate::boards::BoardSettings;

/// Setting store errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingError {
    #[error("Unknown setting key: {0}")]
    KeyNotFound(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<SettingError> for crate::error::AppError {
    fn from(err: SettingError) -> Self {
        match err {
            SettingError::KeyNotFound(_) => Self::NotFound("setting"),
            SettingError::Database(e) => Self::Database(e),
        }
    }
}

struct CachedValue {
    value: Value,
    loaded_at: Instant,
}

/// Cached key/value configuration with built-in defaults.
#[derive(Clone)]
pub struct SettingStore {
    pool: PgPool,
    cache: Arc<DashMap<String, CachedValue>>,
    ttl: Duration,
}

impl SettingStore {
    /// Create a store whose cache entries live for `ttl`.
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            cache: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn cached(&self, key: &str) -> Option<Value> {
        let entry = self.cache.get(key)?;
        if entry.loaded_at.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Resolve `key`.
    ///
    /// With `safe_keys`, keys missing from the defaults table are refused.
    /// A missing row falls back to the built-in default (JSON null for keys
    /// without one).
    #[tracing::instrument(skip(self))]
    pub async fn value_from_key(
        &self,
        key: &str,
        use_cache: bool,
        safe_keys: bool,
    ) -> Result<Value, SettingError> {
        if safe_keys && !is_known(key) {
            return Err(SettingError::KeyNotFound(key.to_string()));
        }

        if use_cache {
            if let Some(value) = self.cached(key) {
                return Ok(value);
            }
        }

        let value = match queries::find_setting(&self.pool, key).await? {
            Some(value) => value,
            None => default_for(key).unwrap_or(Value::Null),
        };

        if use_cache {
            debug!(key, "Setting cache populated");
            self.cache.insert(
                key.to_string(),
                CachedValue {
                    value: value.clone(),
                    loaded_at: Instant::now(),
                },
            );
        }

        Ok(value)
    }

    /// Cached lookup of a known key.
    pub async fn get(&self, key: &str) -> Result<Value, SettingError> {
        self.value_from_key(key, true, false).await
    }

    /// Cached lookup decoded into `T`. Values that do not decode fall back to
    /// the built-in default.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, SettingError> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                warn!(key, error = %e, "Setting has unexpected shape, using default");
                default_for(key)
                    .and_then(|v| serde_json::from_value(v).ok())
                    .ok_or_else(|| SettingError::KeyNotFound(key.to_string()))
            }
        }
    }

    /// Write `value` and drop the cached entry.
    #[tracing::instrument(skip(self, value))]
    pub async fn update(&self, key: &str, value: Value) -> Result<(), SettingError> {
        queries::upsert_setting(&self.pool, key, &value).await?;
        self.cache.remove(key);
        Ok(())
    }

    /// Every known key with its resolved value.
    pub async fn list_all(&self) -> Result<Vec<(String, Value)>, SettingError> {
        let mut out = Vec::with_capacity(DEFAULT_KEYS.len());
        for key in DEFAULT_KEYS {
            out.push(((*key).to_string(), self.value_from_key(key, true, true).await?));
        }
        Ok(out)
    }

    /// Board defaults with the site-wide `app.max_posts` and `app.post_delay`
    /// applied. Per-board settings overlay this.
    pub async fn board_defaults(&self) -> Result<BoardSettings, SettingError> {
        Ok(BoardSettings {
            max_posts: self.get_as("app.max_posts").await?,
            post_delay: self.get_as("app.post_delay").await?,
            ..BoardSettings::default()
        })
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store(pool: PgPool) -> SettingStore {
        SettingStore::new(pool, Duration::from_secs(3600))
    }

    #[sqlx::test]
    async fn test_missing_row_falls_back_to_default(pool: PgPool) {
        let store = store(pool);
        let value = store.value_from_key("app.ident_size", true, true).await.unwrap();
        assert_eq!(value, json!(10));
    }

    #[sqlx::test]
    async fn test_safe_keys_refuses_unknown(pool: PgPool) {
        let store = store(pool);
        let result = store.value_from_key("app.bogus", true, true).await;
        assert!(matches!(result, Err(SettingError::KeyNotFound(_))));

        // Unsafe lookups of unknown keys resolve to null.
        let value = store.value_from_key("app.bogus", false, false).await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[sqlx::test]
    async fn test_update_invalidates_cache(pool: PgPool) {
        let store = store(pool);
        assert_eq!(store.get("app.post_delay").await.unwrap(), json!(10));

        store.update("app.post_delay", json!(30)).await.unwrap();
        assert_eq!(store.get("app.post_delay").await.unwrap(), json!(30));
    }

    #[sqlx::test]
    async fn test_cache_hides_external_writes_until_expiry(pool: PgPool) {
        let store = store(pool.clone());
        assert_eq!(store.get("app.max_posts").await.unwrap(), json!(1000));

        queries::upsert_setting(&pool, "app.max_posts", &json!(5))
            .await
            .unwrap();

        assert_eq!(store.get("app.max_posts").await.unwrap(), json!(1000));
        assert_eq!(
            store.value_from_key("app.max_posts", false, true).await.unwrap(),
            json!(5)
        );

        store.clear_cache();
        assert_eq!(store.get("app.max_posts").await.unwrap(), json!(5));
    }

    #[sqlx::test]
    async fn test_get_as_falls_back_on_bad_shape(pool: PgPool) {
        let store = store(pool);
        store.update("app.ident_size", json!("wide")).await.unwrap();
        let size: usize = store.get_as("app.ident_size").await.unwrap();
        assert_eq!(size, 10);
    }

    #[sqlx::test]
    async fn test_board_defaults_follow_site_settings(pool: PgPool) {
        let store = store(pool);
        let defaults = store.board_defaults().await.unwrap();
        assert_eq!(defaults.max_posts, 1000);
        assert_eq!(defaults.post_delay, 10);

        store.update("app.max_posts", json!(250)).await.unwrap();
        store.update("app.post_delay", json!(45)).await.unwrap();
        let defaults = store.board_defaults().await.unwrap();
        assert_eq!(defaults.max_posts, 250);
        assert_eq!(defaults.post_delay, 45);
        assert_eq!(defaults.name, "Nameless Fanboi");
    }

    #[sqlx::test]
    async fn test_list_all_covers_defaults(pool: PgPool) {
        let store = store(pool);
        store.update("app.time_zone", json!("Asia/Bangkok")).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), DEFAULT_KEYS.len());
        assert!(all.contains(&("app.time_zone".to_string(), json!("Asia/Bangkok"))));
        assert!(all.contains(&("app.max_posts".to_string(), json!(1000))));
    }
}
