//! Raffle Backend Service
//!
//! Daemon entry point for the raffle backend core. It wires
//! configuration, the database pool, and migrations, then hosts the
//! background expiry sweeper. Request transports embed the library's
//! `AppState` and are deployed separately.

use raffle_backend::config::AppConfig;
use raffle_backend::database::{create_pool, run_migrations};
use raffle_backend::error::{AppError, AppResult};
use raffle_backend::services::ExpirySweeper;
use raffle_backend::AppState;
use tracing::{error, info};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("raffle_backend={},sqlx=warn", config.log_level).into()
            }),
        )
        .init();

    info!("Raffle backend service starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    // Run migrations
    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    let app_state = AppState::new(pool, &config);
    info!("✓ Application state initialized with repositories and services");

    // Warm the rate cache so the first quote never waits on providers
    {
        let rate_service = app_state.rate_service.clone();
        tokio::spawn(async move {
            let rate = rate_service.get_rate(true).await;
            info!("Rate cache warmed: {}", rate);
        });
    }

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let sweeper = ExpirySweeper::new(
        app_state.raffle_repo.clone(),
        app_state.ticket_repo.clone(),
    )
    .with_interval(config.cleanup_interval());

    let sweeper_handle = tokio::spawn(async move {
        sweeper.start().await;
    });
    info!(
        "✓ Expiry sweeper background task started ({}s interval)",
        config.cleanup_interval_secs
    );

    info!("Raffle backend service ready. Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = sweeper_handle => {
            error!("Expiry sweeper task exited unexpectedly");
        }
    }

    info!("Raffle backend service shutdown complete");
    Ok(())
}
