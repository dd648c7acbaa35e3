use metrics::{counter, histogram, Counter, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use tracing::info;

use crate::config::MetricsConfig;

pub struct GatewayMetrics {
    pub requests_total: Counter,
    pub errors_5xx_total: Counter,
    pub latency_seconds: Histogram,
}

pub static GATEWAY_METRICS: Lazy<GatewayMetrics> = Lazy::new(|| GatewayMetrics {
    requests_total: counter!("gateway_requests_total"),
    errors_5xx_total: counter!("gateway_5xx_total"),
    latency_seconds: histogram!("gateway_latency_seconds"),
});

/// Installs the Prometheus recorder and its scrape listener. Must run before
/// [`GATEWAY_METRICS`] is first touched, otherwise its handles stay no-ops.
pub fn init_metrics(config: &MetricsConfig) -> anyhow::Result<()> {
    if config.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.port))
            .install()?;

        info!("Metrics exporter initialized on port {}", config.port);
    }

    Ok(())
}

pub fn record_upstream_request(route_id: &str, status_code: u16, latency_seconds: f64) {
    GATEWAY_METRICS.requests_total.increment(1);
    GATEWAY_METRICS.latency_seconds.record(latency_seconds);

    if status_code >= 500 {
        GATEWAY_METRICS.errors_5xx_total.increment(1);
    }

    counter!("gateway_route_requests_total", "route" => route_id.to_string()).increment(1);
}
