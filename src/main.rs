use anyhow::Context;
use tracing_subscriber::EnvFilter;

use school_attendance_api::{app, config, database::DatabaseManager, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting School Attendance API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database).context("creating database pool")?;
    let port = config.server.port;
    let state = AppState::new(pool, config).context("building application state")?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("School Attendance API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
