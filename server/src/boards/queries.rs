//! Board Queries

use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use super::types::{Board, BoardStatus};
use crate::db::db_error;

/// Every board ordered by title.
pub async fn list_all(pool: &PgPool) -> sqlx::Result<Vec<Board>> {
    sqlx::query_as::<_, Board>("SELECT * FROM boards ORDER BY title")
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_all_boards"))
}

/// Boards that are not archived, ordered by title.
pub async fn list_active(pool: &PgPool) -> sqlx::Result<Vec<Board>> {
    sqlx::query_as::<_, Board>(
        r"SELECT * FROM boards
          WHERE status IN ('open', 'restricted', 'locked')
          ORDER BY title",
    )
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_active_boards"))
}

pub async fn find_by_slug(pool: &PgPool, slug: &str) -> sqlx::Result<Option<Board>> {
    sqlx::query_as::<_, Board>("SELECT * FROM boards WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_board_by_slug", slug = %slug))
}

/// Board by id inside an open transaction.
pub async fn find_by_id_in(conn: &mut PgConnection, id: i64) -> sqlx::Result<Option<Board>> {
    sqlx::query_as::<_, Board>("SELECT * FROM boards WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(db_error!("find_board_by_id", board_id = id))
}

pub async fn create(
    pool: &PgPool,
    slug: &str,
    title: &str,
    description: Option<&str>,
    agreements: Option<&str>,
    status: BoardStatus,
    settings: &Value,
) -> sqlx::Result<Board> {
    sqlx::query_as::<_, Board>(
        r"INSERT INTO boards (slug, title, description, agreements, status, settings)
          VALUES ($1, $2, $3, $4, $5, $6)
          RETURNING *",
    )
    .bind(slug)
    .bind(title)
    .bind(description)
    .bind(agreements)
    .bind(status)
    .bind(settings)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_board", slug = %slug))
}

/// Persist every mutable column of `board`.
pub async fn save(pool: &PgPool, board: &Board) -> sqlx::Result<Board> {
    sqlx::query_as::<_, Board>(
        r"UPDATE boards
          SET title = $2, description = $3, agreements = $4, status = $5, settings = $6,
              updated_at = NOW()
          WHERE id = $1
          RETURNING *",
    )
    .bind(board.id)
    .bind(&board.title)
    .bind(&board.description)
    .bind(&board.agreements)
    .bind(board.status)
    .bind(&board.settings)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_board", board_id = board.id))
}
