use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod telemetry;

use crate::config::AppConfig;
use crate::middleware::{global_filter_middleware, GlobalFilters};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }
}

/// Assembles the gateway: every request, routed or not, passes through the
/// global filters before reaching a handler.
pub fn build_app(state: AppState, filters: GlobalFilters) -> Router {
    let timeout = Duration::from_secs(state.config.server.timeout_seconds);

    Router::new()
        .route("/health", get(routes::health::health))
        .fallback(routes::proxy::proxy)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(filters, global_filter_middleware))
                // Inside the filters, so a timed-out request still completes
                // the chain with a 408.
                .layer(TimeoutLayer::new(timeout)),
        )
}
