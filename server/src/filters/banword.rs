//! Banned word filter.
//!
//! Settings (`ext.filters.banword`): `false` disables the filter; anything
//! else (including the default `true`) enables it.

use std::sync::Arc;

use async_trait::async_trait;
use fb_common::ErrorKind;
use serde_json::Value;
use sqlx::PgPool;

use super::types::{Filter, FilterError, FilterServices, ServiceKind, Submission};
use crate::moderation::{board_scope, BanwordCache};

pub struct BanwordFilter {
    enabled: bool,
    pool: PgPool,
    cache: Arc<BanwordCache>,
}

impl BanwordFilter {
    pub fn build(value: &Value, services: &FilterServices) -> Result<Box<dyn Filter>, FilterError> {
        let (pool, cache) = services
            .banwords
            .clone()
            .ok_or(FilterError::MissingService(ServiceKind::Banwords))?;
        Ok(Box::new(Self {
            enabled: value.as_bool() != Some(false),
            pool,
            cache,
        }))
    }
}

#[async_trait]
impl Filter for BanwordFilter {
    fn reject_kind(&self) -> ErrorKind {
        ErrorKind::BanwordRejected
    }

    async fn should_reject(&self, payload: &Submission) -> Result<bool, FilterError> {
        if !self.enabled {
            return Ok(false);
        }

        let scope = payload.board.as_deref().map(board_scope);
        let engine = self.cache.get_or_build(&self.pool, scope.as_deref()).await?;
        Ok(engine.first_match(&payload.body, &payload.scopes()).is_some())
    }
}
