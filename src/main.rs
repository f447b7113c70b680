//! bizmap - company directory server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bizmap::{
    api::{self, AppState},
    config::Config,
    db,
    services::{AccountService, SystemClock},
};

/// Interval between login rate-limiter sweeps
const RATE_LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizmap=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting bizmap...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Build application state
    let state = AppState::new(&config, pool, Arc::new(SystemClock))?;
    tracing::info!(
        timezone = %config.search.timezone,
        timeout_ms = config.search.timeout_ms,
        "Search configured"
    );

    spawn_session_sweep(
        state.account_service.clone(),
        Duration::from_secs(config.session.cleanup_interval_secs),
    );
    spawn_rate_limiter_cleanup(state.account_service.clone());

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically delete expired sessions
fn spawn_session_sweep(accounts: Arc<AccountService>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match accounts.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Expired sessions removed"),
                Err(e) => tracing::warn!("Session sweep failed: {}", e),
            }
        }
    });
}

fn spawn_rate_limiter_cleanup(accounts: Arc<AccountService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            accounts.cleanup_rate_limiter().await;
        }
    });
}
