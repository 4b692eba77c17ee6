//! Topic Queries
//!
//! Listings are ordered by `bumped_at` descending with the topic id as a
//! tie-breaker.

use sqlx::{PgConnection, PgPool};

use super::types::{Topic, TopicStatus};
use crate::db::db_error;

/// Topics shown on a board's recent listing and the site-wide listing.
pub const RECENT_TOPIC_LIMIT: i64 = 10;

const TOPIC_COLUMNS: &str = r"t.id, t.board_id, t.title, t.status, t.created_at, t.updated_at,
    m.post_count, m.posted_at, m.bumped_at";

/// Every topic on a board except expired ones.
pub async fn list_from_board_slug(pool: &PgPool, slug: &str) -> sqlx::Result<Vec<Topic>> {
    sqlx::query_as::<_, Topic>(&format!(
        r"SELECT {TOPIC_COLUMNS}
          FROM topics t
          JOIN topic_metas m ON m.topic_id = t.id
          JOIN boards b ON b.id = t.board_id
          WHERE b.slug = $1 AND t.status <> 'expired'
          ORDER BY m.bumped_at DESC, t.id DESC"
    ))
    .bind(slug)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_topics_from_board_slug", slug = %slug))
}

/// Topics in a board's active window.
pub async fn list_active_from_board_slug(pool: &PgPool, slug: &str) -> sqlx::Result<Vec<Topic>> {
    sqlx::query_as::<_, Topic>(&format!(
        r"SELECT {TOPIC_COLUMNS}
          FROM topics t
          JOIN topic_metas m ON m.topic_id = t.id
          JOIN boards b ON b.id = t.board_id
          WHERE b.slug = $1 AND t.status IN ('open', 'locked')
          ORDER BY m.bumped_at DESC, t.id DESC"
    ))
    .bind(slug)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_active_topics_from_board_slug", slug = %slug))
}

/// The most recently bumped active topics on a board.
pub async fn list_recent_from_board_slug(pool: &PgPool, slug: &str) -> sqlx::Result<Vec<Topic>> {
    sqlx::query_as::<_, Topic>(&format!(
        r"SELECT {TOPIC_COLUMNS}
          FROM topics t
          JOIN topic_metas m ON m.topic_id = t.id
          JOIN boards b ON b.id = t.board_id
          WHERE b.slug = $1 AND t.status IN ('open', 'locked')
          ORDER BY m.bumped_at DESC, t.id DESC
          LIMIT $2"
    ))
    .bind(slug)
    .bind(RECENT_TOPIC_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_recent_topics_from_board_slug", slug = %slug))
}

/// The most recently bumped active topics across listed boards.
pub async fn list_recent(pool: &PgPool) -> sqlx::Result<Vec<Topic>> {
    sqlx::query_as::<_, Topic>(&format!(
        r"SELECT {TOPIC_COLUMNS}
          FROM topics t
          JOIN topic_metas m ON m.topic_id = t.id
          JOIN boards b ON b.id = t.board_id
          WHERE t.status IN ('open', 'locked') AND b.status <> 'archived'
          ORDER BY m.bumped_at DESC, t.id DESC
          LIMIT $1"
    ))
    .bind(RECENT_TOPIC_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_recent_topics"))
}

pub async fn find(pool: &PgPool, id: i64) -> sqlx::Result<Option<Topic>> {
    sqlx::query_as::<_, Topic>(&format!(
        r"SELECT {TOPIC_COLUMNS}
          FROM topics t
          JOIN topic_metas m ON m.topic_id = t.id
          WHERE t.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_topic", topic_id = id))
}

/// Topic by id inside an open transaction.
///
/// Row-locks the topic until the transaction ends, so status changes from
/// the sweep or an admin serialise with writers reading it here.
pub async fn find_in(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<Topic>> {
    sqlx::query_as::<_, Topic>(&format!(
        r"SELECT {TOPIC_COLUMNS}
          FROM topics t
          JOIN topic_metas m ON m.topic_id = t.id
          WHERE t.id = $1
          FOR UPDATE OF t"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(db_error!("find_topic_in_tx", topic_id = id))
}

pub async fn set_status(
    conn: &mut PgConnection,
    id: i64,
    status: TopicStatus,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE topics SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await
        .map_err(db_error!("set_topic_status", topic_id = id))?;
    Ok(())
}

/// Drop a topic and, by cascade, its posts and counters.
pub async fn delete(pool: &PgPool, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM topics WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_topic", topic_id = id))?;
    Ok(result.rows_affected() > 0)
}
