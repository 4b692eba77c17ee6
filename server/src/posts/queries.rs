//! Post Queries

use async_trait::async_trait;
use fb_common::{PostRange, Selection};
use sqlx::PgPool;

use super::types::Post;
use crate::db::{self, db_error, LOCK_SEED_TOPIC_POST_NUMBER};
use crate::filters::SeenLookup;

/// How far back a poster's history counts as "recently seen".
pub const RECENTLY_SEEN_DAYS: i32 = 3;

pub async fn find(pool: &PgPool, id: i64) -> sqlx::Result<Option<Post>> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_post", post_id = id))
}

/// Posts of a topic matching `range`, ordered by number.
pub async fn list_by_topic(
    pool: &PgPool,
    topic_id: i64,
    range: &PostRange,
) -> sqlx::Result<Vec<Post>> {
    match range.selection() {
        Selection::Empty => Ok(Vec::new()),
        Selection::Numbers { lower, upper } => sqlx::query_as::<_, Post>(
            r"SELECT * FROM posts
              WHERE topic_id = $1
                AND ($2::bigint IS NULL OR number >= $2)
                AND ($3::bigint IS NULL OR number <= $3)
              ORDER BY number",
        )
        .bind(topic_id)
        .bind(lower)
        .bind(upper)
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_posts_by_topic", topic_id = topic_id)),
        Selection::Last(count) => sqlx::query_as::<_, Post>(
            r"SELECT * FROM (
                  SELECT * FROM posts WHERE topic_id = $1 ORDER BY number DESC LIMIT $2
              ) last_posts
              ORDER BY number",
        )
        .bind(topic_id)
        .bind(count)
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_last_posts_by_topic", topic_id = topic_id)),
    }
}

/// Whether `ip_address` has posted anywhere within [`RECENTLY_SEEN_DAYS`].
pub async fn was_recently_seen(pool: &PgPool, ip_address: &str) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r"SELECT EXISTS(
              SELECT 1 FROM posts
              WHERE ip_address = $1 AND created_at >= NOW() - make_interval(days => $2)
          )",
    )
    .bind(ip_address)
    .bind(RECENTLY_SEEN_DAYS)
    .fetch_one(pool)
    .await
    .map_err(db_error!("was_recently_seen"))
}

/// Delete the posts of a topic matching `range` and recompute its counters.
///
/// Runs under the per-topic numbering lock so a concurrent append never
/// overwrites the recount with a stale `post_count`.
///
/// Returns the number of posts removed, or `None` when the range covers the
/// opening post (the topic must be deleted instead).
pub async fn delete_range(
    pool: &PgPool,
    topic_id: i64,
    range: &PostRange,
) -> sqlx::Result<Option<u64>> {
    let mut tx = pool.begin().await?;
    db::advisory_xact_lock(&mut tx, topic_id, LOCK_SEED_TOPIC_POST_NUMBER).await?;

    let (lower, upper) = match range.selection() {
        Selection::Empty => return Ok(Some(0)),
        Selection::Numbers { lower, upper } => (lower, upper),
        Selection::Last(count) => {
            let max: Option<i32> =
                sqlx::query_scalar("SELECT MAX(number) FROM posts WHERE topic_id = $1")
                    .bind(topic_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_error!("max_post_number", topic_id = topic_id))?;
            let Some(max) = max else { return Ok(Some(0)) };
            (Some(i64::from(max) - count + 1), None)
        }
    };

    if lower.is_none_or(|l| l <= 1) && upper.is_none_or(|u| u >= 1) {
        return Ok(None);
    }

    let deleted = sqlx::query(
        r"DELETE FROM posts
          WHERE topic_id = $1
            AND ($2::bigint IS NULL OR number >= $2)
            AND ($3::bigint IS NULL OR number <= $3)",
    )
    .bind(topic_id)
    .bind(lower)
    .bind(upper)
    .execute(&mut *tx)
    .await
    .map_err(db_error!("delete_post_range", topic_id = topic_id))?
    .rows_affected();

    sqlx::query(
        r"UPDATE topic_metas
          SET post_count = (SELECT COUNT(*) FROM posts WHERE topic_id = $1)
          WHERE topic_id = $1",
    )
    .bind(topic_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error!("recount_topic_posts", topic_id = topic_id))?;

    tx.commit().await?;
    Ok(Some(deleted))
}

/// Post lookups shared with the filter chain.
#[derive(Clone)]
pub struct PostQuery {
    pool: PgPool,
}

impl PostQuery {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeenLookup for PostQuery {
    async fn was_recently_seen(&self, ip_address: &str) -> sqlx::Result<bool> {
        was_recently_seen(&self.pool, ip_address).await
    }
}
