//! API Router and Application State
//!
//! Central routing configuration and shared state. Public routes live under
//! `/api/1.0`, admin routes under `/api/1.0/admin`.

pub mod extract;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::get;
use axum::{Json, Router};
use fred::prelude::*;
use serde::Serialize;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::filters::{self, FilterChain, FilterServices};
use crate::identity::IdentityService;
use crate::moderation::{BanEngine, BanwordCache};
use crate::pages::constants::MAX_BODY_SIZE;
use crate::posts::{PostQuery, PostWriter};
use crate::ratelimit::RateLimiter;
use crate::settings::SettingStore;
use crate::tasks::{TaskDispatcher, TaskWorker};
use crate::topics::TopicWriter;
use crate::{admin, boards, pages, tasks, topics};

/// Request bodies above this are refused before extraction.
const MAX_REQUEST_BODY: usize = MAX_BODY_SIZE + 16 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Redis client
    pub redis: Client,
    /// Server configuration
    pub config: Arc<Config>,
    /// Runtime settings with a process-local cache
    pub settings: SettingStore,
    /// Submission cooldowns
    pub rate_limiter: RateLimiter,
    /// Ban lookups
    pub bans: BanEngine,
    /// Compiled banword rules, invalidated on admin writes
    pub banwords: Arc<BanwordCache>,
    /// Post creation (numbering, attribution, bump)
    pub posts: PostWriter,
    /// Topic creation
    pub topics: TopicWriter,
    /// Submission queue
    pub tasks: TaskDispatcher,
}

impl AppState {
    /// Create new application state.
    pub fn new(db: PgPool, redis: Client, config: Config) -> Self {
        let settings = SettingStore::new(
            db.clone(),
            Duration::from_secs(config.settings_cache_ttl_secs),
        );
        let posts = PostWriter::new(
            db.clone(),
            IdentityService::new(redis.clone()),
            settings.clone(),
        );
        let topics = TopicWriter::new(db.clone(), posts.clone());

        Self {
            rate_limiter: RateLimiter::new(redis.clone()),
            bans: BanEngine::new(db.clone()),
            banwords: Arc::new(BanwordCache::new()),
            tasks: TaskDispatcher::new(redis.clone(), config.task_result_ttl_secs as i64),
            config: Arc::new(config),
            settings,
            posts,
            topics,
            redis,
            db,
        }
    }

    /// Build the submission worker sharing this state's services.
    pub fn worker(&self) -> anyhow::Result<TaskWorker> {
        let timeout = Duration::from_secs(self.config.http_timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let services = FilterServices {
            http: Some(http),
            dns_timeout: Some(timeout),
            banwords: Some((self.db.clone(), self.banwords.clone())),
            server_url: self.config.server_url.clone(),
        };
        let chain = FilterChain::new(
            filters::default_registry(),
            services,
            self.settings.clone(),
            Arc::new(PostQuery::new(self.db.clone())),
        );

        Ok(TaskWorker::new(
            self.tasks.clone(),
            chain,
            self.bans.clone(),
            self.rate_limiter.clone(),
            self.topics.clone(),
            self.posts.clone(),
            Duration::from_secs(self.config.task_timeout_secs),
        ))
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .nest("/boards", boards::router())
        .nest("/topics", topics::router())
        .nest("/tasks", tasks::router())
        .nest("/pages", pages::router())
        .nest("/admin", admin::router(state.clone()));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/1.0", api)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether the database answered
    database: bool,
    /// Whether the Redis client is connected
    redis: bool,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .inspect_err(|e| warn!(error = %e, "Health check: database unreachable"))
        .is_ok();
    let redis = state.redis.is_connected();
    if !redis {
        warn!("Health check: redis disconnected");
    }

    Json(HealthResponse {
        status: if database && redis { "ok" } else { "degraded" },
        database,
        redis,
    })
}
