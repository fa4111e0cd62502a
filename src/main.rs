use std::sync::Arc;

use recommendation_server::{
    catalog::{self, HttpCatalogClient},
    config::Config,
    models::CatalogSnapshot,
    routes::{create_router, AppState},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("recommendation_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let seed = match &config.catalog_seed_path {
        Some(path) => catalog::load_seed(path)?,
        None => CatalogSnapshot::empty(),
    };

    let client = Arc::new(HttpCatalogClient::new(config.catalog_url.clone()));
    let state = Arc::new(AppState::from_config(&config, client, seed));

    // Keep the catalog fresh in the background
    let refresh_loop = state.service.cache().spawn_refresh_loop();

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(
        address = %config.bind_address(),
        catalog_url = %config.catalog_url,
        "Recommendation server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh_loop.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
