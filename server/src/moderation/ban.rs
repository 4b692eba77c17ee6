//! Ban Engine
//!
//! Answers "is this address banned here?" for a client IP and a set of
//! scope strings such as `board:foo`.

use std::net::IpAddr;

use chrono::Utc;
use sqlx::PgPool;

use super::queries;
use super::types::Ban;

/// Ban lookups against the `bans` table.
#[derive(Clone)]
pub struct BanEngine {
    pool: PgPool,
}

impl BanEngine {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// First active rule matching `ip` in `scopes`, if any.
    #[tracing::instrument(skip(self))]
    pub async fn matching_ban(&self, ip: IpAddr, scopes: &[String]) -> sqlx::Result<Option<Ban>> {
        let now = Utc::now();
        let candidates = queries::list_effective_bans(&self.pool, scopes, now).await?;
        Ok(candidates
            .into_iter()
            .find(|ban| ban.matches(ip, scopes, now)))
    }

    /// Whether any active rule matches.
    pub async fn is_banned(&self, ip: IpAddr, scopes: &[String]) -> sqlx::Result<bool> {
        Ok(self.matching_ban(ip, scopes).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::types::board_scope;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[sqlx::test]
    async fn test_scoped_ban_matches_only_its_board(pool: PgPool) {
        queries::create_ban(&pool, "127.0.0.0/24", Some("spam"), None, Some("board:foo"), true)
            .await
            .unwrap();
        let engine = BanEngine::new(pool);

        let ban = engine
            .matching_ban(ip("127.0.0.1"), &[board_scope("foo")])
            .await
            .unwrap()
            .expect("ban should match");
        assert_eq!(ban.description.as_deref(), Some("spam"));

        assert!(!engine
            .is_banned(ip("127.0.0.1"), &[board_scope("bar")])
            .await
            .unwrap());
        assert!(!engine
            .is_banned(ip("127.0.1.1"), &[board_scope("foo")])
            .await
            .unwrap());
    }

    #[sqlx::test]
    async fn test_global_and_inactive_bans(pool: PgPool) {
        queries::create_ban(&pool, "10.0.0.0/8", None, Some(3), None, true)
            .await
            .unwrap();
        queries::create_ban(&pool, "192.168.0.0/16", None, None, None, false)
            .await
            .unwrap();
        let engine = BanEngine::new(pool);

        assert!(engine
            .is_banned(ip("10.20.30.40"), &[board_scope("any")])
            .await
            .unwrap());
        assert!(!engine.is_banned(ip("192.168.1.1"), &[]).await.unwrap());
    }

    #[sqlx::test]
    async fn test_expired_ban_is_ignored(pool: PgPool) {
        let mut ban = queries::create_ban(&pool, "10.0.0.1/32", None, Some(1), None, true)
            .await
            .unwrap();
        assert_eq!(ban.duration_days(), Some(1));

        ban.active_until = Some(Utc::now() - chrono::Duration::hours(1));
        queries::save_ban(&pool, &ban).await.unwrap();

        let engine = BanEngine::new(pool);
        assert!(!engine.is_banned(ip("10.0.0.1"), &[]).await.unwrap());
    }
}
