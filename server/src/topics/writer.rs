//! Topic Writer
//!
//! Creates topics under the per-board advisory lock. The same transaction
//! expires stale topics and archives everything that falls out of the
//! board's active window, so listings never see a half-swept board.

use sqlx::{PgConnection, PgPool};
use tracing::info;

use super::queries;
use super::types::Topic;
use crate::boards;
use crate::db::{self, db_error, LOCK_SEED_BOARD_TOPIC_SWEEP};
use crate::error::{AppError, AppResult};
use crate::posts::writer::{append, Append};
use crate::posts::{NewPost, PostWriter};
use crate::topics::TopicStatus;

#[derive(Clone)]
pub struct TopicWriter {
    pool: PgPool,
    posts: PostWriter,
}

impl TopicWriter {
    pub const fn new(pool: PgPool, posts: PostWriter) -> Self {
        Self { pool, posts }
    }

    /// Open a topic on `board_slug` with `new` as its first post.
    #[tracing::instrument(skip(self, title, new))]
    pub async fn create(&self, board_slug: &str, title: &str, new: NewPost) -> AppResult<Topic> {
        let board = boards::queries::find_by_slug(&self.pool, board_slug)
            .await?
            .ok_or(AppError::NotFound("board"))?;
        let settings = self.posts.board_settings(&board).await?;
        let attribution = self.posts.attribution(&board, &settings, &new).await?;

        let mut tx = self.pool.begin().await?;
        db::advisory_xact_lock(&mut tx, board.id, LOCK_SEED_BOARD_TOPIC_SWEEP).await?;

        let board = boards::queries::find_by_id_in(&mut tx, board.id)
            .await?
            .ok_or(AppError::NotFound("board"))?;
        if !board.status.accepts_topics() {
            return Err(board.status.rejection());
        }

        let expired = expire_stale(&mut tx, board.id, settings.expire_duration).await?;

        let topic_id: i64 = sqlx::query_scalar(
            "INSERT INTO topics (board_id, title) VALUES ($1, $2) RETURNING id",
        )
        .bind(board.id)
        .bind(title)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error!("insert_topic", board_id = board.id))?;

        sqlx::query("INSERT INTO topic_metas (topic_id) VALUES ($1)")
            .bind(topic_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error!("insert_topic_meta", topic_id = topic_id))?;

        match append(&mut tx, topic_id, &board, &settings, &attribution, &new).await? {
            Append::Created(_) => {}
            Append::LimitReached => return Err(TopicStatus::Locked.rejection()),
        }

        let archived = archive_overflow(&mut tx, board.id, settings.max_topics).await?;
        tx.commit().await?;

        if expired > 0 || archived > 0 {
            info!(board = %board.slug, expired, archived, "Swept board topics");
        }

        queries::find(&self.pool, topic_id)
            .await?
            .ok_or(AppError::NotFound("topic"))
    }
}

/// Expire open topics whose last post is older than `expire_days`.
/// A non-positive duration disables expiry.
async fn expire_stale(conn: &mut PgConnection, board_id: i64, expire_days: i64) -> sqlx::Result<u64> {
    if expire_days <= 0 {
        return Ok(0);
    }
    let days = i32::try_from(expire_days).unwrap_or(i32::MAX);

    let result = sqlx::query(
        r"UPDATE topics t
          SET status = 'expired', updated_at = NOW()
          FROM topic_metas m
          WHERE m.topic_id = t.id
            AND t.board_id = $1
            AND t.status = 'open'
            AND m.posted_at < NOW() - make_interval(days => $2)",
    )
    .bind(board_id)
    .bind(days)
    .execute(conn)
    .await
    .map_err(db_error!("expire_stale_topics", board_id = board_id))?;
    Ok(result.rows_affected())
}

/// Archive active topics ranked beyond `max_topics` by bump order.
/// A non-positive limit disables archival.
async fn archive_overflow(conn: &mut PgConnection, board_id: i64, max_topics: i64) -> sqlx::Result<u64> {
    if max_topics <= 0 {
        return Ok(0);
    }

    let result = sqlx::query(
        r"UPDATE topics
          SET status = 'archived', updated_at = NOW()
          WHERE id IN (
              SELECT t.id
              FROM topics t
              JOIN topic_metas m ON m.topic_id = t.id
              WHERE t.board_id = $1 AND t.status IN ('open', 'locked')
              ORDER BY m.bumped_at DESC, t.id DESC
              OFFSET $2
          )",
    )
    .bind(board_id)
    .bind(max_topics)
    .execute(conn)
    .await
    .map_err(db_error!("archive_overflow_topics", board_id = board_id))?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::boards::BoardStatus;
    use crate::posts::writer::tests::{new_post, offline_writer};
    use crate::posts::IdentType;

    async fn board(pool: &PgPool, status: BoardStatus, settings: serde_json::Value) {
        boards::queries::create(pool, "foo", "Foo", None, None, status, &settings)
            .await
            .unwrap();
    }

    fn writer(pool: &PgPool) -> TopicWriter {
        TopicWriter::new(pool.clone(), offline_writer(pool.clone()))
    }

    #[sqlx::test]
    async fn test_create_writes_opening_post(pool: PgPool) {
        board(&pool, BoardStatus::Open, json!({"use_ident": false})).await;

        let topic = writer(&pool)
            .create("foo", "Hello, world!", new_post("Hello, world!", true))
            .await
            .unwrap();
        assert_eq!(topic.status, TopicStatus::Open);
        assert_eq!(topic.post_count, 1);
        assert_eq!(topic.title, "Hello, world!");

        let posts = crate::posts::queries::list_by_topic(&pool, topic.id, &fb_common::PostRange::All)
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].number, 1);
        assert_eq!(posts[0].ident_type, IdentType::None);
        assert_eq!(topic.bumped_at, posts[0].created_at);
    }

    #[sqlx::test]
    async fn test_board_status_gates_topics(pool: PgPool) {
        board(&pool, BoardStatus::Restricted, json!({"use_ident": false})).await;

        let err = writer(&pool)
            .create("foo", "Hello, world!", new_post("Hello, world!", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusRejected { ref status } if status == "restricted"));

        let err = writer(&pool)
            .create("nope", "Hello, world!", new_post("Hello, world!", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("board")));
    }

    #[sqlx::test]
    async fn test_topics_beyond_window_are_archived(pool: PgPool) {
        board(&pool, BoardStatus::Open, json!({"use_ident": false, "max_topics": 2})).await;
        let writer = writer(&pool);

        let first = writer
            .create("foo", "First topic", new_post("First topic", true))
            .await
            .unwrap();
        let second = writer
            .create("foo", "Second topic", new_post("Second topic", true))
            .await
            .unwrap();
        // Bumping the first keeps it inside the window
        writer
            .posts
            .create(first.id, new_post("Bump the first", true))
            .await
            .unwrap();
        let third = writer
            .create("foo", "Third topic", new_post("Third topic", true))
            .await
            .unwrap();

        let status = |id| {
            let pool = pool.clone();
            async move { queries::find(&pool, id).await.unwrap().unwrap().status }
        };
        assert_eq!(status(first.id).await, TopicStatus::Open);
        assert_eq!(status(second.id).await, TopicStatus::Archived);
        assert_eq!(status(third.id).await, TopicStatus::Open);

        let active: Vec<i64> = queries::list_active_from_board_slug(&pool, "foo")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(active, vec![third.id, first.id]);
    }

    #[sqlx::test]
    async fn test_stale_topics_expire(pool: PgPool) {
        board(&pool, BoardStatus::Open, json!({"use_ident": false, "expire_duration": 7})).await;
        let writer = writer(&pool);

        let stale = writer
            .create("foo", "Stale topic", new_post("Stale topic", true))
            .await
            .unwrap();
        sqlx::query("UPDATE topic_metas SET posted_at = NOW() - INTERVAL '8 days' WHERE topic_id = $1")
            .bind(stale.id)
            .execute(&pool)
            .await
            .unwrap();

        let fresh = writer
            .create("foo", "Fresh topic", new_post("Fresh topic", true))
            .await
            .unwrap();

        let stale = queries::find(&pool, stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, TopicStatus::Expired);
        assert_eq!(fresh.status, TopicStatus::Open);

        let listed: Vec<i64> = queries::list_from_board_slug(&pool, "foo")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(listed, vec![fresh.id]);
    }
}
