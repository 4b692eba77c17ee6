//! Database queries for pages.

use sqlx::PgPool;

use super::constants::{internal_formatter, MAX_SLUG_LENGTH, RESERVED_SLUGS};
use super::types::{Page, PageFormatter, PageListItem, PageNamespace};
use crate::db::db_error;

/// Generate URL-friendly slug from title.
#[must_use]
pub fn slugify(title: &str) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    slug.chars().take(MAX_SLUG_LENGTH).collect()
}

/// Check if slug is a reserved path.
#[must_use]
pub fn is_reserved_slug(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

async fn list_namespace(pool: &PgPool, namespace: PageNamespace) -> sqlx::Result<Vec<PageListItem>> {
    sqlx::query_as::<_, PageListItem>(
        r"SELECT id, slug, title, namespace, updated_at FROM pages
          WHERE namespace = $1
          ORDER BY title, slug",
    )
    .bind(namespace)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_pages", namespace = %namespace))
}

pub async fn list_public(pool: &PgPool) -> sqlx::Result<Vec<PageListItem>> {
    list_namespace(pool, PageNamespace::Public).await
}

/// Stored internal pages. Rows whose slug left the whitelist are hidden.
pub async fn list_internal(pool: &PgPool) -> sqlx::Result<Vec<PageListItem>> {
    let pages = list_namespace(pool, PageNamespace::Internal).await?;
    Ok(pages
        .into_iter()
        .filter(|p| internal_formatter(&p.slug).is_some())
        .collect())
}

async fn find(pool: &PgPool, namespace: PageNamespace, slug: &str) -> sqlx::Result<Option<Page>> {
    sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE namespace = $1 AND slug = $2")
        .bind(namespace)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_page", namespace = %namespace, slug = %slug))
}

pub async fn public_page_from_slug(pool: &PgPool, slug: &str) -> sqlx::Result<Option<Page>> {
    find(pool, PageNamespace::Public, slug).await
}

/// Internal page by slug. Slugs outside the whitelist never reach the store.
pub async fn internal_page_from_slug(pool: &PgPool, slug: &str) -> sqlx::Result<Option<Page>> {
    if internal_formatter(slug).is_none() {
        return Ok(None);
    }
    find(pool, PageNamespace::Internal, slug).await
}

/// Whether `slug` is taken in `namespace`, ignoring page `exclude_id`.
pub async fn slug_exists(
    pool: &PgPool,
    namespace: PageNamespace,
    slug: &str,
    exclude_id: Option<i64>,
) -> sqlx::Result<bool> {
    sqlx::query_scalar(
        r"SELECT EXISTS(
              SELECT 1 FROM pages
              WHERE namespace = $1 AND slug = $2
                AND ($3::bigint IS NULL OR id != $3)
          )",
    )
    .bind(namespace)
    .bind(slug)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
    .map_err(db_error!("page_slug_exists", slug = %slug))
}

pub async fn create(
    pool: &PgPool,
    namespace: PageNamespace,
    slug: &str,
    title: &str,
    body: &str,
    formatter: PageFormatter,
) -> sqlx::Result<Page> {
    sqlx::query_as::<_, Page>(
        r"INSERT INTO pages (namespace, slug, title, body, formatter)
          VALUES ($1, $2, $3, $4, $5)
          RETURNING *",
    )
    .bind(namespace)
    .bind(slug)
    .bind(title)
    .bind(body)
    .bind(formatter)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_page", slug = %slug))
}

/// Persist every mutable column of `page`.
pub async fn save(pool: &PgPool, page: &Page) -> sqlx::Result<Page> {
    sqlx::query_as::<_, Page>(
        r"UPDATE pages
          SET slug = $2, title = $3, body = $4, formatter = $5, updated_at = NOW()
          WHERE id = $1
          RETURNING *",
    )
    .bind(page.id)
    .bind(&page.slug)
    .bind(&page.title)
    .bind(&page.body)
    .bind(page.formatter)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_page", page_id = page.id))
}

/// Create or replace a whitelisted internal page.
pub async fn upsert_internal(
    pool: &PgPool,
    slug: &str,
    title: &str,
    body: &str,
    formatter: PageFormatter,
) -> sqlx::Result<Page> {
    sqlx::query_as::<_, Page>(
        r"INSERT INTO pages (namespace, slug, title, body, formatter)
          VALUES ('internal', $1, $2, $3, $4)
          ON CONFLICT (namespace, slug) DO UPDATE
          SET title = EXCLUDED.title, body = EXCLUDED.body,
              formatter = EXCLUDED.formatter, updated_at = NOW()
          RETURNING *",
    )
    .bind(slug)
    .bind(title)
    .bind(body)
    .bind(formatter)
    .fetch_one(pool)
    .await
    .map_err(db_error!("upsert_internal_page", slug = %slug))
}

/// Delete a page. Returns whether a row existed.
pub async fn delete(pool: &PgPool, namespace: PageNamespace, slug: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM pages WHERE namespace = $1 AND slug = $2")
        .bind(namespace)
        .bind(slug)
        .execute(pool)
        .await
        .map_err(db_error!("delete_page", namespace = %namespace, slug = %slug))?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Terms of Service"), "terms-of-service");
        assert_eq!(slugify("  FAQ!! (v2) "), "faq-v2");
        assert_eq!(slugify(&"x".repeat(100)).len(), MAX_SLUG_LENGTH);
    }

    #[test]
    fn test_reserved_slugs() {
        assert!(is_reserved_slug("admin"));
        assert!(!is_reserved_slug("rules"));
    }

    #[sqlx::test]
    async fn test_namespaces_are_separate(pool: PgPool) {
        create(&pool, PageNamespace::Public, "rules", "Rules", "Be nice", PageFormatter::Markdown)
            .await
            .unwrap();
        upsert_internal(&pool, "global/footer", "Footer", "<b>f</b>", PageFormatter::Html)
            .await
            .unwrap();

        let public = list_public(&pool).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].slug, "rules");

        let internal = list_internal(&pool).await.unwrap();
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].slug, "global/footer");

        assert!(public_page_from_slug(&pool, "global/footer").await.unwrap().is_none());
        assert!(internal_page_from_slug(&pool, "rules").await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn test_internal_lookup_requires_whitelist(pool: PgPool) {
        // A stray row outside the whitelist is never served
        create(&pool, PageNamespace::Internal, "global/secret", "S", "x", PageFormatter::None)
            .await
            .unwrap();
        assert!(internal_page_from_slug(&pool, "global/secret").await.unwrap().is_none());
        assert!(list_internal(&pool).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn test_upsert_internal_replaces(pool: PgPool) {
        upsert_internal(&pool, "global/css", "CSS", "a{}", PageFormatter::None)
            .await
            .unwrap();
        let page = upsert_internal(&pool, "global/css", "CSS", "b{}", PageFormatter::None)
            .await
            .unwrap();
        assert_eq!(page.body, "b{}");
        assert_eq!(list_internal(&pool).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn test_delete_and_slug_exists(pool: PgPool) {
        let page = create(&pool, PageNamespace::Public, "faq", "FAQ", "Q", PageFormatter::None)
            .await
            .unwrap();
        assert!(slug_exists(&pool, PageNamespace::Public, "faq", None).await.unwrap());
        assert!(!slug_exists(&pool, PageNamespace::Public, "faq", Some(page.id))
            .await
            .unwrap());

        assert!(delete(&pool, PageNamespace::Public, "faq").await.unwrap());
        assert!(!delete(&pool, PageNamespace::Public, "faq").await.unwrap());
    }
}
