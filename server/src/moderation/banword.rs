//! Banword Engine
//!
//! Compiled banned-word expressions, cached per scope context using
//! `DashMap` for lock-free concurrent reads. Engines are built on first use
//! and dropped on any banword write.
//!
//! A global generation counter keeps an in-flight build from stale rows from
//! overwriting a newer invalidation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use regex::Regex;
use sqlx::PgPool;
use tracing::warn;

use super::queries;
use super::types::{scope_applies, Banword};
use crate::error::AppError;

/// Compiled banwords for one scope context.
#[derive(Debug, Default)]
pub struct BanwordEngine {
    rules: Vec<(i64, Option<String>, Regex)>,
}

impl BanwordEngine {
    /// Compile `banwords`, skipping (and logging) rows whose expression no
    /// longer compiles.
    pub fn build(banwords: &[Banword]) -> Self {
        let rules = banwords
            .iter()
            .filter(|b| b.active)
            .filter_map(|b| match Regex::new(&b.expr) {
                Ok(re) => Some((b.id, b.scope.clone(), re)),
                Err(e) => {
                    warn!(banword_id = b.id, error = %e, "Skipping banword with invalid expression");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Id of the first rule that finds a match in `body` within `scopes`.
    pub fn first_match(&self, body: &str, scopes: &[String]) -> Option<i64> {
        self.rules
            .iter()
            .find(|(_, scope, re)| scope_applies(scope.as_deref(), scopes) && re.is_match(body))
            .map(|(id, _, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

struct CachedEngine {
    engine: Arc<BanwordEngine>,
}

/// Thread-safe cache of banword engines keyed by scope context.
#[derive(Default)]
pub struct BanwordCache {
    engines: DashMap<Option<String>, CachedEngine>,
    generation: AtomicU64,
}

impl BanwordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine for `scope` (global rules plus rules of that scope).
    #[tracing::instrument(skip(self, pool))]
    pub async fn get_or_build(
        &self,
        pool: &PgPool,
        scope: Option<&str>,
    ) -> sqlx::Result<Arc<BanwordEngine>> {
        let key = scope.map(str::to_string);
        if let Some(entry) = self.engines.get(&key) {
            return Ok(Arc::clone(&entry.engine));
        }

        let gen_before = self.generation.load(Ordering::Acquire);
        let rows = queries::list_effective_banwords(pool, scope).await?;
        let engine = Arc::new(BanwordEngine::build(&rows));

        if gen_before == self.generation.load(Ordering::Acquire) {
            self.engines.insert(
                key,
                CachedEngine {
                    engine: Arc::clone(&engine),
                },
            );
        }

        Ok(engine)
    }

    /// Drop every cached engine.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::Release);
        self.engines.clear();
    }
}

/// Check that `pattern` compiles and is not pathologically slow.
pub fn validate_regex(pattern: &str) -> Result<Regex, AppError> {
    let regex = Regex::new(pattern)
        .map_err(|e| AppError::invalid("expr", format!("Invalid regular expression: {e}")))?;

    let sample = "a".repeat(1000);
    let start = Instant::now();
    let _ = regex.is_match(&sample);
    if start.elapsed() > Duration::from_millis(10) {
        return Err(AppError::invalid(
            "expr",
            "Regular expression is too slow. Simplify the pattern.",
        ));
    }

    Ok(regex)
}
