use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aquifer_db::common::AppState;
use aquifer_db::config::Config;
use aquifer_db::forecast::{Forecaster, ModelRegistry};
use aquifer_db::jobs;
use aquifer_db::routes;
use aquifer_db::telemetry::SimulatedTelemetry;
use aquifer_db::weather::WeatherClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aquifer_db=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting aquifer-db...");

    // Load configuration (fail-fast)
    let config = Config::from_env()?;
    tracing::info!(
        deployment = ?config.deployment,
        host = %config.api_host,
        port = config.api_port,
        "Configuration loaded"
    );

    // Connect to database (fail-fast)
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Migrations completed");

    // Load trained district models; absent artifacts mean fallback forecasting
    let registry = ModelRegistry::load_from_dir(Path::new(&config.models_dir));
    let forecaster = Arc::new(Forecaster::new(registry));

    let weather = Arc::new(WeatherClient::new(&config));
    tracing::info!("Weather client initialized");

    // Create application state
    let state = AppState::new(db, Arc::new(config.clone()), weather, forecaster);

    // Spawn background jobs (fire-and-forget, non-blocking)
    tracing::info!("Spawning background jobs...");
    tokio::spawn(jobs::run_forecast_sync(state.clone()));
    tokio::spawn(jobs::run_telemetry_sync(
        state.clone(),
        SimulatedTelemetry::new(),
    ));

    // Build router
    let app = routes::build_router(state);

    // Start server with graceful shutdown
    let addr = config.bind_address();
    tracing::info!(address = %addr, "Starting server");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
