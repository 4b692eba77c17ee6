//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for sending requests through the full axum router,
//! plus helpers for boards, admin sessions and draining the task queue.
//!
//! Requires the test containers described on `Config::default_for_test`.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{self, header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use fb_server::admin::auth::hash_password;
use fb_server::admin::middleware::CSRF_HEADER;
use fb_server::admin::{queries as admin_queries, AdminPermissions};
use fb_server::api::{create_router, AppState};
use fb_server::boards::{self, BoardStatus};
use fb_server::config::Config;
use fb_server::db;
use fb_server::tasks::Task;

// ============================================================================
// Shared resources
// ============================================================================

/// Shared database pool across all tests in the same binary.
static SHARED_POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Shared Redis client across all tests in the same binary.
static SHARED_REDIS: OnceCell<fred::clients::Client> = OnceCell::const_new();

/// Get or create a shared, migrated database pool.
pub async fn shared_pool() -> &'static PgPool {
    SHARED_POOL
        .get_or_init(|| async {
            let config = Config::default_for_test();
            let pool = db::create_pool(&config.database_url)
                .await
                .expect("Failed to connect to test DB");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");
            pool
        })
        .await
}

/// Get or create a shared Redis client.
pub async fn shared_redis() -> &'static fred::clients::Client {
    SHARED_REDIS
        .get_or_init(|| async {
            let config = Config::default_for_test();
            db::create_redis_client(&config.redis_url)
                .await
                .expect("Failed to connect to test Redis")
        })
        .await
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: PgPool,
}

impl TestApp {
    /// Create a new test app using shared DB and Redis connections.
    ///
    /// The DNS blacklist is switched off so the worker never leaves the host.
    pub async fn new() -> Self {
        let pool = shared_pool().await.clone();
        let redis = shared_redis().await.clone();
        let state = AppState::new(pool.clone(), redis, Config::default_for_test());
        state
            .settings
            .update("ext.filters.dnsbl", Value::Null)
            .await
            .expect("Failed to disable dnsbl");

        Self {
            router: create_router(state.clone()),
            state,
            pool,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a JSON body.
    pub async fn send_json(&self, method: Method, uri: &str, body: &Value) -> Response<Body> {
        let request = Self::request(method, uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        self.oneshot(request).await
    }

    /// Send a GET request.
    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Self::request(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");
        self.oneshot(request).await
    }

    /// Pop queued tasks and process them until `uid` has been handled.
    pub async fn drain_until(&self, uid: &str) {
        let worker = self.state.worker().expect("Failed to build worker");
        for _ in 0..100 {
            let payload = self
                .state
                .tasks
                .next_payload(1.0)
                .await
                .expect("Failed to pop task queue")
                .unwrap_or_else(|| panic!("Task {uid} never reached the queue"));
            let task: Task = serde_json::from_str(&payload).expect("Malformed task payload");
            let done = task.uid == uid;
            worker.process(task).await;
            if done {
                return;
            }
        }
        panic!("Task {uid} not found in the first 100 queued tasks");
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

// ============================================================================
// Data helpers
// ============================================================================

/// A board slug no other test uses.
pub fn unique_slug(prefix: &str) -> String {
    format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..10])
}

/// Create an open board with `settings` merged over the defaults.
pub async fn create_board(pool: &PgPool, slug: &str, settings: Value) -> boards::Board {
    boards::queries::create(pool, slug, "Test Board", None, None, BoardStatus::Open, &settings)
        .await
        .expect("Failed to create board")
}

/// Delete a board and everything under it.
pub async fn delete_board(pool: &PgPool, slug: &str) {
    let _ = sqlx::query("DELETE FROM boards WHERE slug = $1")
        .bind(slug)
        .execute(pool)
        .await;
}

/// An admin account with a live session.
pub struct AdminSession {
    pub user_id: Uuid,
    pub token: String,
    pub csrf_token: String,
}

impl AdminSession {
    /// Attach the session headers to `builder`.
    pub fn authorize(&self, builder: http::request::Builder) -> http::request::Builder {
        builder
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CSRF_HEADER, &self.csrf_token)
    }
}

/// Create an admin holding `permissions` and log them in through the API.
pub async fn login_admin(app: &TestApp, permissions: AdminPermissions) -> AdminSession {
    let username = unique_slug("admin_");
    let password = "correct horse battery staple";
    let hash = hash_password(password).expect("Failed to hash password");

    let user = admin_queries::create_user(&app.pool, &username, "Test Admin", &hash)
        .await
        .expect("Failed to create admin user");
    let group_id = admin_queries::upsert_group(&app.pool, &unique_slug("group_"), permissions)
        .await
        .expect("Failed to create group");
    admin_queries::add_user_to_group(&app.pool, user.id, group_id)
        .await
        .expect("Failed to add user to group");

    let response = app
        .send_json(
            Method::POST,
            "/api/1.0/admin/login",
            &json!({ "username": username, "password": password }),
        )
        .await;
    assert_eq!(response.status(), 200, "admin login failed");
    let body = body_to_json(response).await;

    AdminSession {
        user_id: user.id,
        token: body["token"].as_str().expect("token").to_string(),
        csrf_token: body["csrf_token"].as_str().expect("csrf_token").to_string(),
    }
}

/// Delete an admin account (sessions and memberships cascade).
pub async fn delete_admin(pool: &PgPool, user_id: Uuid) {
    let _ = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await;
}
