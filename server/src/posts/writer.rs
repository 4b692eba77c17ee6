//! Post Writer
//!
//! Appends posts under the per-topic advisory lock so numbers stay dense and
//! the topic counters always match the rows they describe.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::info;

use super::types::{clamp_name, IdentType, NewPost, Post};
use crate::boards::{self, Board, BoardSettings};
use crate::db::{self, db_error, LOCK_SEED_TOPIC_POST_NUMBER};
use crate::error::{AppError, AppResult};
use crate::identity::{identity_key, IdentityService};
use crate::settings::SettingStore;
use crate::topics::{self, TopicStatus};

/// Name, identity and identity kind recorded on a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub name: String,
    pub ident: Option<String>,
    pub ident_type: IdentType,
}

/// Result of appending inside a caller's transaction.
#[derive(Debug)]
pub enum Append {
    Created(Post),
    /// The topic is full; the caller should lock it.
    LimitReached,
}

#[derive(Clone)]
pub struct PostWriter {
    pool: PgPool,
    identity: IdentityService,
    settings: SettingStore,
}

impl PostWriter {
    pub const fn new(pool: PgPool, identity: IdentityService, settings: SettingStore) -> Self {
        Self {
            pool,
            identity,
            settings,
        }
    }

    /// `board`'s settings merged over the site-wide defaults.
    pub async fn board_settings(&self, board: &Board) -> AppResult<BoardSettings> {
        Ok(board.settings_over(self.settings.board_defaults().await?))
    }

    /// Derive the attribution for `new` on `board`.
    ///
    /// Runs before the numbering lock is taken so the identity lookup never
    /// extends the critical section.
    pub async fn attribution(
        &self,
        board: &Board,
        settings: &BoardSettings,
        new: &NewPost,
    ) -> AppResult<Attribution> {
        if let Some(author) = &new.author {
            return Ok(Attribution {
                name: clamp_name(&author.name),
                ident: Some(author.ident.clone()),
                ident_type: IdentType::IdentAdmin,
            });
        }

        if !settings.use_ident {
            return Ok(Attribution {
                name: settings.name.clone(),
                ident: None,
                ident_type: IdentType::None,
            });
        }

        let size: usize = self.settings.get_as("app.ident_size").await?;
        let key = identity_key([
            ("ip", new.ip_address.as_str()),
            ("board", board.slug.as_str()),
        ]);
        let ident = self.identity.identity_for(&key, size).await?;

        Ok(Attribution {
            name: settings.name.clone(),
            ident: Some(ident),
            ident_type: IdentType::Ident,
        })
    }

    /// Reply to an existing topic.
    ///
    /// When the reply would exceed the board's `max_posts`, the topic is
    /// locked and the reply is refused with status `locked`.
    #[tracing::instrument(skip(self, new))]
    pub async fn create(&self, topic_id: i64, new: NewPost) -> AppResult<Post> {
        let topic = topics::queries::find(&self.pool, topic_id)
            .await?
            .ok_or(AppError::NotFound("topic"))?;

        let mut tx = self.pool.begin().await?;
        let board = boards::queries::find_by_id_in(&mut tx, topic.board_id)
            .await?
            .ok_or(AppError::NotFound("board"))?;
        let settings = self.board_settings(&board).await?;
        let attribution = self.attribution(&board, &settings, &new).await?;

        match append(&mut tx, topic_id, &board, &settings, &attribution, &new).await? {
            Append::Created(post) => {
                tx.commit().await?;
                Ok(post)
            }
            Append::LimitReached => {
                topics::queries::set_status(&mut tx, topic_id, TopicStatus::Locked).await?;
                tx.commit().await?;
                info!(topic_id, max_posts = settings.max_posts, "Topic reached post limit and was locked");
                Err(TopicStatus::Locked.rejection())
            }
        }
    }
}

/// Append a post to `topic_id` inside the caller's transaction.
///
/// Takes the per-topic numbering lock, re-reads the topic under it and
/// refuses the write unless both the board and the topic accept posts.
pub async fn append(
    conn: &mut PgConnection,
    topic_id: i64,
    board: &Board,
    settings: &BoardSettings,
    attribution: &Attribution,
    new: &NewPost,
) -> AppResult<Append> {
    db::advisory_xact_lock(conn, topic_id, LOCK_SEED_TOPIC_POST_NUMBER).await?;

    let topic = topics::queries::find_in(conn, topic_id)
        .await?
        .ok_or(AppError::NotFound("topic"))?;

    if !board.status.accepts_posts() {
        return Err(board.status.rejection());
    }
    if !topic.status.accepts_posts() {
        return Err(topic.status.rejection());
    }

    let post_count = topic.post_count + 1;
    if post_count > settings.max_posts {
        return Ok(Append::LimitReached);
    }

    // Read after the lock so timestamps follow commit order
    let now: DateTime<Utc> = sqlx::query_scalar("SELECT clock_timestamp()")
        .fetch_one(&mut *conn)
        .await?;

    let number: i32 =
        sqlx::query_scalar("SELECT COALESCE(MAX(number), 0) + 1 FROM posts WHERE topic_id = $1")
            .bind(topic_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error!("next_post_number", topic_id = topic_id))?;

    let post = sqlx::query_as::<_, Post>(
        r"INSERT INTO posts
              (topic_id, number, name, body, ip_address, ident, ident_type, bumped,
               created_at, updated_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
          RETURNING *",
    )
    .bind(topic_id)
    .bind(number)
    .bind(&attribution.name)
    .bind(&new.body)
    .bind(&new.ip_address)
    .bind(&attribution.ident)
    .bind(attribution.ident_type)
    .bind(new.bumped)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_post", topic_id = topic_id, number = number))?;

    sqlx::query(
        r"UPDATE topic_metas
          SET post_count = $2,
              posted_at = $3,
              bumped_at = CASE WHEN $4 THEN GREATEST(bumped_at, $3) ELSE bumped_at END
          WHERE topic_id = $1",
    )
    .bind(topic_id)
    .bind(post_count)
    .bind(now)
    .bind(new.bumped)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("update_topic_meta", topic_id = topic_id))?;

    Ok(Append::Created(post))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use fb_common::PostRange;
    use serde_json::json;

    use super::*;
    use crate::boards::BoardStatus;
    use crate::posts::queries;
    use crate::posts::types::PostAuthor;

    /// Writer whose identity service is never contacted; boards used with it
    /// must disable identities.
    pub(crate) fn offline_writer(pool: PgPool) -> PostWriter {
        let redis = fred::clients::Client::new(fred::prelude::Config::default(), None, None, None);
        PostWriter::new(
            pool.clone(),
            IdentityService::new(redis),
            SettingStore::new(pool, Duration::from_secs(60)),
        )
    }

    pub(crate) fn new_post(body: &str, bumped: bool) -> NewPost {
        NewPost {
            body: body.into(),
            bumped,
            ip_address: "10.0.0.1".into(),
            author: None,
        }
    }

    async fn topic_with_op(pool: &PgPool, settings: serde_json::Value) -> i64 {
        let board = boards::queries::create(
            pool,
            "foo",
            "Foo",
            None,
            None,
            BoardStatus::Open,
            &settings,
        )
        .await
        .unwrap();
        let topic_id: i64 =
            sqlx::query_scalar("INSERT INTO topics (board_id, title) VALUES ($1, 'Hello') RETURNING id")
                .bind(board.id)
                .fetch_one(pool)
                .await
                .unwrap();
        sqlx::query("INSERT INTO topic_metas (topic_id) VALUES ($1)")
            .bind(topic_id)
            .execute(pool)
            .await
            .unwrap();
        offline_writer(pool.clone())
            .create(topic_id, new_post("Opening post", true))
            .await
            .unwrap();
        topic_id
    }

    #[sqlx::test]
    async fn test_numbers_are_dense_and_counters_follow(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());

        let second = writer.create(topic_id, new_post("Second post", true)).await.unwrap();
        let third = writer.create(topic_id, new_post("Third post", false)).await.unwrap();
        assert_eq!(second.number, 2);
        assert_eq!(third.number, 3);
        assert_eq!(third.name, "Nameless Fanboi");
        assert_eq!(third.ident_type, IdentType::None);

        let topic = topics::queries::find(&pool, topic_id).await.unwrap().unwrap();
        assert_eq!(topic.post_count, 3);
        assert_eq!(topic.posted_at, third.created_at);
        // Sage does not bump
        assert_eq!(topic.bumped_at, second.created_at);
    }

    #[sqlx::test]
    async fn test_concurrent_replies_get_distinct_numbers(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());

        let mut handles = Vec::new();
        for i in 0..8 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                writer
                    .create(topic_id, new_post(&format!("Reply number {i}"), true))
                    .await
                    .unwrap()
                    .number
            }));
        }
        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (2..=9).collect::<Vec<i32>>());

        let topic = topics::queries::find(&pool, topic_id).await.unwrap().unwrap();
        assert_eq!(topic.post_count, 9);
    }

    #[sqlx::test]
    async fn test_topic_locks_at_post_limit(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false, "max_posts": 3})).await;
        let writer = offline_writer(pool.clone());

        writer.create(topic_id, new_post("Second post", true)).await.unwrap();
        writer.create(topic_id, new_post("Third post", true)).await.unwrap();
        let err = writer
            .create(topic_id, new_post("Fourth post", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusRejected { ref status } if status == "locked"));

        let topic = topics::queries::find(&pool, topic_id).await.unwrap().unwrap();
        assert_eq!(topic.status, TopicStatus::Locked);
        assert_eq!(topic.post_count, 3);

        // Further replies see the lock itself
        let err = writer
            .create(topic_id, new_post("Fifth post", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusRejected { ref status } if status == "locked"));
    }

    #[sqlx::test]
    async fn test_site_max_posts_applies_to_boards_without_their_own(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());
        writer.settings.update("app.max_posts", json!(2)).await.unwrap();

        writer.create(topic_id, new_post("Second post", true)).await.unwrap();
        let err = writer
            .create(topic_id, new_post("Third post", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusRejected { ref status } if status == "locked"));
    }

    #[sqlx::test]
    async fn test_board_status_gates_replies(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());

        let mut board = boards::queries::find_by_slug(&pool, "foo").await.unwrap().unwrap();
        board.status = BoardStatus::Restricted;
        boards::queries::save(&pool, &board).await.unwrap();
        writer.create(topic_id, new_post("Still allowed", true)).await.unwrap();

        board.status = BoardStatus::Archived;
        boards::queries::save(&pool, &board).await.unwrap();
        let err = writer
            .create(topic_id, new_post("Not allowed", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusRejected { ref status } if status == "archived"));
    }

    #[sqlx::test]
    async fn test_staff_attribution(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());

        let mut post = new_post("Staff reply", true);
        post.author = Some(PostAuthor {
            name: "Moderator".into(),
            ident: "mod".into(),
        });
        let created = writer.create(topic_id, post).await.unwrap();
        assert_eq!(created.name, "Moderator");
        assert_eq!(created.ident.as_deref(), Some("mod"));
        assert_eq!(created.ident_type, IdentType::IdentAdmin);
    }

    #[sqlx::test]
    async fn test_missing_topic(pool: PgPool) {
        let err = offline_writer(pool)
            .create(42, new_post("Nobody home", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("topic")));
    }

    #[sqlx::test]
    async fn test_range_listing_on_fifty_posts(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());
        for i in 2..=50 {
            writer
                .create(topic_id, new_post(&format!("Reply {i}"), true))
                .await
                .unwrap();
        }

        let numbers = |posts: Vec<Post>| posts.into_iter().map(|p| p.number).collect::<Vec<_>>();
        let select = |token: &str| token.parse::<PostRange>().unwrap();

        let all = queries::list_by_topic(&pool, topic_id, &select("1-50")).await.unwrap();
        assert_eq!(numbers(all), (1..=50).collect::<Vec<_>>());

        let none = queries::list_by_topic(&pool, topic_id, &select("51")).await.unwrap();
        assert!(none.is_empty());

        let last = queries::list_by_topic(&pool, topic_id, &select("l30")).await.unwrap();
        assert_eq!(numbers(last), (21..=50).collect::<Vec<_>>());

        let empty = queries::list_by_topic(&pool, topic_id, &select("-0")).await.unwrap();
        assert!(empty.is_empty());

        let clamped = queries::list_by_topic(&pool, topic_id, &select("0-51")).await.unwrap();
        assert_eq!(clamped.len(), 50);
    }

    #[sqlx::test]
    async fn test_delete_range_recounts_and_protects_opening_post(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());
        for i in 2..=5 {
            writer
                .create(topic_id, new_post(&format!("Reply {i}"), true))
                .await
                .unwrap();
        }

        let covers_op = queries::delete_range(&pool, topic_id, &"1-2".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(covers_op, None);

        let deleted = queries::delete_range(&pool, topic_id, &"3-4".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(deleted, Some(2));

        let topic = topics::queries::find(&pool, topic_id).await.unwrap().unwrap();
        assert_eq!(topic.post_count, 3);

        // Numbering continues after the highest remaining number
        let next = writer.create(topic_id, new_post("After delete", true)).await.unwrap();
        assert_eq!(next.number, 6);
    }

    #[sqlx::test]
    async fn test_delete_range_waits_for_an_inflight_append(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let writer = offline_writer(pool.clone());
        for i in 2..=5 {
            writer
                .create(topic_id, new_post(&format!("Reply {i}"), true))
                .await
                .unwrap();
        }

        let board = boards::queries::find_by_slug(&pool, "foo").await.unwrap().unwrap();
        let settings = board.settings();
        let attribution = Attribution {
            name: settings.name.clone(),
            ident: None,
            ident_type: IdentType::None,
        };

        // Hold the numbering lock with an uncommitted reply
        let mut tx = pool.begin().await.unwrap();
        let appended = append(&mut tx, topic_id, &board, &settings, &attribution, &new_post("Slow reply", true))
            .await
            .unwrap();
        assert!(matches!(appended, Append::Created(ref post) if post.number == 6));

        let deleting = tokio::spawn({
            let pool = pool.clone();
            async move {
                queries::delete_range(&pool, topic_id, &"3-4".parse().unwrap())
                    .await
                    .unwrap()
            }
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!deleting.is_finished(), "delete ran while the topic was locked");

        tx.commit().await.unwrap();
        assert_eq!(deleting.await.unwrap(), Some(2));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE topic_id = $1")
            .bind(topic_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        let topic = topics::queries::find(&pool, topic_id).await.unwrap().unwrap();
        assert_eq!(rows, 4);
        assert_eq!(i64::from(topic.post_count), rows);
    }

    #[sqlx::test]
    async fn test_status_change_waits_for_an_inflight_append(pool: PgPool) {
        let topic_id = topic_with_op(&pool, json!({"use_ident": false})).await;
        let board = boards::queries::find_by_slug(&pool, "foo").await.unwrap().unwrap();
        let settings = board.settings();
        let attribution = Attribution {
            name: settings.name.clone(),
            ident: None,
            ident_type: IdentType::None,
        };

        let mut tx = pool.begin().await.unwrap();
        append(&mut tx, topic_id, &board, &settings, &attribution, &new_post("Slow reply", true))
            .await
            .unwrap();

        // The sweep and admin updates write the topic row directly
        let archiving = tokio::spawn({
            let pool = pool.clone();
            async move {
                let mut conn = pool.acquire().await.unwrap();
                topics::queries::set_status(&mut conn, topic_id, TopicStatus::Archived)
                    .await
                    .unwrap();
            }
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!archiving.is_finished(), "status changed under an open append");

        tx.commit().await.unwrap();
        archiving.await.unwrap();

        // Later replies see the archived status
        let err = offline_writer(pool.clone())
            .create(topic_id, new_post("Too late", true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StatusRejected { ref status } if status == "archived"));
    }

    #[sqlx::test]
    async fn test_recently_seen(pool: PgPool) {
        topic_with_op(&pool, json!({"use_ident": false})).await;
        assert!(queries::was_recently_seen(&pool, "10.0.0.1").await.unwrap());
        assert!(!queries::was_recently_seen(&pool, "10.0.0.2").await.unwrap());

        sqlx::query("UPDATE posts SET created_at = NOW() - INTERVAL '4 days'")
            .execute(&pool)
            .await
            .unwrap();
        assert!(!queries::was_recently_seen(&pool, "10.0.0.1").await.unwrap());
    }
}
