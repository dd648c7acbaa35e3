use anyhow::Result;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use gateway_request_log::{
    build_app,
    config::AppConfig,
    metrics::init_metrics,
    middleware::{GlobalFilters, RequestLogFilter},
    telemetry::{init_tracing, TracingSink},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;
    info!("Configuration loaded: {} route(s)", config.routes.len());

    init_metrics(&config.metrics)?;

    let mut filters = GlobalFilters::new();
    if config.filters.request_log.enabled {
        filters = filters.register(RequestLogFilter::from_config(
            &config.filters.request_log,
            Arc::new(TracingSink::new()),
        ));
    }
    info!(filters = ?filters.names(), "Global filters registered");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_app(AppState::new(config), filters);
    let listener = TcpListener::bind(&addr).await?;

    info!("Gateway starting on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
