//! Fanboard Server - Main Entry Point
//!
//! Anonymous imageboard backend. Runs the HTTP API and the submission worker
//! in one process.

use anyhow::Result;
use std::net::SocketAddr;
use tracing::{error, info, warn};

use fb_server::{admin, api, config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fb_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Fanboard Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;
    info!("Database connected and migrations applied");

    // Initialize Redis
    let redis = db::create_redis_client(&config.redis_url).await?;
    info!("Redis connected");

    // Build application state
    let state = api::AppState::new(db_pool, redis, config.clone());

    // First-run admin account
    match (&config.admin_username, &config.admin_password) {
        (Some(username), Some(password)) => {
            admin::setup::bootstrap(&state.db, &state.settings, username, password).await?;
        }
        _ => {
            if !admin::setup::is_setup_complete(&state.settings).await? {
                warn!("Setup incomplete: set ADMIN_USERNAME and ADMIN_PASSWORD to create an admin");
            }
        }
    }

    // Submission worker
    let worker = state.worker()?;
    let worker_handle = tokio::spawn(worker.run(config.worker_concurrency));

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    worker_handle.abort();
    info!("Server shutdown complete");

    Ok(())
}
