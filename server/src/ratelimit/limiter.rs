//! Submission rate limiter backed by Redis.
//!
//! Each limit is a single Redis key whose existence means "limited" and whose
//! TTL is the remaining cooldown. Writes are last-writer-wins.
//!
//! In scaled mode every offense is also appended to a companion timestamp
//! list (same tags plus `type=ts`). The number of offenses inside the
//! retention window stretches the cooldown logarithmically, reaching
//! `expiration * period / 10` once `threshold` offenses have been recorded.

use std::sync::Arc;

use fb_common::TagKey;
use fred::prelude::*;
use fred::types::Expiration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Key namespace for rate-limit state.
pub const RATE_LIMITER_NAMESPACE: &str = "services.rate_limiter";

/// Seconds a timestamp stays in the scaled-mode offense list.
pub const TIMESTAMP_RETENTION_SECS: i64 = 7200;

/// Embedded Lua script that records one offense and returns the window count.
const SCALED_SCRIPT: &str = include_str!("scaled.lua");

/// Parameters for one `limit_for` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    /// Base cooldown in seconds.
    pub expiration: u64,
    /// Offenses needed to reach the maximum cooldown (0 = naive).
    pub threshold: u32,
    /// Scale reference in seconds; the maximum cooldown is
    /// `expiration * period / 10` (0 = naive).
    pub period: u64,
}

impl Limit {
    /// Fixed-window limit.
    pub const fn naive(expiration: u64) -> Self {
        Self {
            expiration,
            threshold: 0,
            period: 0,
        }
    }

    /// Whether this limit uses the scaled back-off.
    pub const fn is_scaled(&self) -> bool {
        self.threshold != 0 && self.period != 0
    }
}

/// Effective cooldown for the `count`-th offense in scaled mode.
///
/// `r = exp(ln(period / 10) / (threshold - 1))` and the cooldown is
/// `round(expiration * r^(c - 1))` with `c = min(count, threshold)`.
/// A threshold of one saturates immediately.
pub fn scaled_ttl(expiration: u64, threshold: u32, period: u64, count: u64) -> u64 {
    let expiration = expiration as f64;
    let ceiling = period as f64 / 10.0;
    let c = count.clamp(1, u64::from(threshold.max(1)));

    let factor = if threshold <= 1 {
        ceiling
    } else {
        let ratio = (ceiling.ln() / f64::from(threshold - 1)).exp();
        ratio.powi((c - 1) as i32)
    };

    (expiration * factor).round().max(0.0) as u64
}

/// Builds a key in the rate-limiter namespace.
pub fn rate_key<I, K, V>(tags: I) -> TagKey
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    TagKey::new(RATE_LIMITER_NAMESPACE).tags(tags)
}

/// Key used for anonymous submissions on a board.
pub fn submission_key(ip_address: &str, board_slug: &str) -> TagKey {
    rate_key([("ip_address", ip_address), ("board", board_slug)])
}

/// Redis-backed rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    redis: Client,
    script_sha: Arc<RwLock<Option<String>>>,
}

impl RateLimiter {
    /// Creates a new rate limiter instance. The script is loaded lazily.
    pub fn new(redis: Client) -> Self {
        Self {
            redis,
            script_sha: Arc::new(RwLock::new(None)),
        }
    }

    /// Loads or reloads the offense script into Redis.
    async fn load_script(&self) -> Result<String, Error> {
        let sha: String = self.redis.script_load(SCALED_SCRIPT).await?;
        info!(sha = %sha, "Rate limit script loaded into Redis");
        *self.script_sha.write().await = Some(sha.clone());
        Ok(sha)
    }

    /// Checks if an error is a NOSCRIPT error (script not found in Redis).
    fn is_noscript_error(error: &Error) -> bool {
        error.to_string().contains("NOSCRIPT")
    }

    /// Records an offense and returns the number inside the retention window.
    async fn record_offense(&self, ts_key: &str) -> Result<u64, Error> {
        let cached = self.script_sha.read().await.clone();
        let sha = match cached {
            Some(sha) => sha,
            None => self.load_script().await?,
        };

        let args = vec![TIMESTAMP_RETENTION_SECS.to_string()];
        let result: Result<i64, Error> = self
            .redis
            .evalsha(sha.as_str(), vec![ts_key], args.clone())
            .await;

        let count = match result {
            Ok(count) => count,
            Err(e) if Self::is_noscript_error(&e) => {
                warn!("NOSCRIPT error, reloading rate limit script");
                let sha = self.load_script().await?;
                self.redis.evalsha(sha.as_str(), vec![ts_key], args).await?
            }
            Err(e) => return Err(e),
        };

        Ok(count.max(1) as u64)
    }

    /// Sets the limit flag for `key` and returns the applied TTL.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn limit_for(&self, limit: Limit, key: &TagKey) -> Result<u64, Error> {
        let ttl = if limit.is_scaled() {
            let ts_key = key.clone().tag("type", "ts").encode();
            let count = self.record_offense(&ts_key).await?;
            scaled_ttl(limit.expiration, limit.threshold, limit.period, count)
        } else {
            limit.expiration
        };

        if ttl == 0 {
            return Ok(0);
        }

        let _: () = self
            .redis
            .set(
                key.encode(),
                1,
                Some(Expiration::EX(ttl as i64)),
                None,
                false,
            )
            .await?;

        debug!(ttl, "Rate limit set");
        Ok(ttl)
    }

    /// Whether `key` is currently limited.
    pub async fn is_limited(&self, key: &TagKey) -> Result<bool, Error> {
        let exists: i64 = self.redis.exists(key.encode()).await?;
        Ok(exists > 0)
    }

    /// Remaining cooldown in seconds, 0 when not limited.
    pub async fn time_left(&self, key: &TagKey) -> Result<i64, Error> {
        let ttl: i64 = self.redis.ttl(key.encode()).await?;
        Ok(ttl.max(0))
    }
}
