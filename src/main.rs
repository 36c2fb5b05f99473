use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use campus_vault::config;
use campus_vault::database::DatabaseManager;
use campus_vault::tenancy::TenantAwareExecutor;
use campus_vault::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, ENCRYPTION_SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    info!("Starting Campus Vault in {:?} mode", config.environment);
    info!(
        "Tenant schemas: {:?} (default {})",
        config.tenancy.schemas, config.tenancy.default_schema
    );

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect database pool")?;
    let executor = Arc::new(TenantAwareExecutor::start(&config.worker));
    let state = AppState::build(config, pool.clone(), executor.clone())
        .context("invalid startup configuration")?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Campus Vault listening on http://{}", bind_addr);

    axum::serve(listener, app(state, config.security.enable_cors))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    executor.shutdown().await;
    DatabaseManager::close(&pool).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
