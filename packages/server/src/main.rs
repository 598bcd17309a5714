use std::net::SocketAddr;

use anyhow::Context;
use stagehand_server::config::AppConfig;
use stagehand_server::database::init_db;
use stagehand_server::state::AppState;
use stagehand_server::storage::build_object_store;
use stagehand_server::{build_router, sweeper};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = init_db(&config.database)
        .await
        .context("Failed to initialise database")?;
    let store = build_object_store(&config.storage)
        .await
        .context("Failed to initialise object store")?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let state = AppState::new(config, db, store);
    let shutdown = CancellationToken::new();

    if state.config.gc.enabled {
        tokio::spawn(sweeper::run_sweeper(
            state.originals.clone(),
            state.reconcile.clone(),
            state.config.gc.clone(),
            shutdown.clone(),
        ));
    } else {
        info!("Storage sweeper disabled");
    }

    let app = build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    shutdown.cancel();
}
