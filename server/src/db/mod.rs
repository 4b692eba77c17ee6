//! Database Layer
//!
//! `PostgreSQL` and Redis connections.
//!
//! Advisory Lock Seed Registry
//! - 61 = `topic_post_number` (serialises post numbering within one topic)
//!   - Called from: server/src/posts/writer.rs
//! - 63 = `board_topic_sweep` (serialises topic creation and the archive/expiry
//!   sweep within one board)
//!   - Called from: server/src/topics/writer.rs

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::info;

/// Seed for the per-topic numbering lock.
pub const LOCK_SEED_TOPIC_POST_NUMBER: i64 = 61;

/// Seed for the per-board topic creation lock.
pub const LOCK_SEED_BOARD_TOPIC_SWEEP: i64 = 63;

/// Log and return a database error with context.
///
/// Query functions use this so failures are logged with the query name and
/// the identifying fields before being propagated.
macro_rules! db_error {
    ($query:expr) => {
        |e| {
            tracing::error!(query = $query, error = %e, "Database query failed");
            e
        }
    };
    ($query:expr, $($field:tt)*) => {
        |e| {
            tracing::error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}
pub(crate) use db_error;

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(5)
        .max_connections(20)
        // Fail fast on pool exhaustion instead of queueing submissions forever
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Create Redis client.
pub async fn create_redis_client(redis_url: &str) -> Result<fred::clients::Client> {
    use fred::prelude::*;

    let config = Config::from_url(redis_url)?;
    let client = Client::new(config, None, None, None);
    client.connect();
    client.wait_for_connect().await?;

    info!("Connected to Redis");
    Ok(client)
}

/// Take a transaction-scoped advisory lock on `(key, seed)`.
///
/// The lock is released when the surrounding transaction commits or rolls
/// back. Waiters block; there is no retry loop.
pub async fn advisory_xact_lock(
    conn: &mut PgConnection,
    key: impl std::fmt::Display,
    seed: i64,
) -> sqlx::Result<()> {
    let key = key.to_string();
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, $2))")
        .bind(&key)
        .bind(seed)
        .execute(conn)
        .await
        .map_err(db_error!("advisory_xact_lock", key = %key, seed = seed))?;
    Ok(())
}
