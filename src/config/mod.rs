use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::middleware::logging::DEFAULT_REQUEST_LOG_ORDER;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
    /// Upper bound for request and upstream response bodies buffered by the
    /// proxy.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `json` or `pretty`.
    pub format: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    pub request_log: RequestLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLogConfig {
    pub enabled: bool,
    pub order: i32,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            order: DEFAULT_REQUEST_LOG_ORDER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub id: String,
    pub path_prefix: String,
    pub upstream: String,
    #[serde(default)]
    pub strip_prefix: bool,
    #[serde(default = "default_route_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_route_timeout_ms() -> u64 {
    10_000
}

impl AppConfig {
    pub fn load() -> Result<Self, GatewayError> {
        let config_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| "config/default.yaml".to_string());

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"));

        // Override with environment variables if present
        if let Ok(host) = std::env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }
        if let Ok(metrics_port) = std::env::var("METRICS_PORT") {
            builder = builder.set_override("metrics.port", metrics_port)?;
        }

        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn from_yaml(source: &str) -> Result<Self, GatewayError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Yaml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::HIGHEST_PRECEDENCE;

    #[test]
    fn defaults_place_request_log_early() {
        let config = AppConfig::default();
        assert!(config.filters.request_log.enabled);
        assert_eq!(config.filters.request_log.order, HIGHEST_PRECEDENCE + 100);
        assert_eq!(config.server.port, 8080);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn parses_yaml_with_partial_sections() {
        let config = AppConfig::from_yaml(
            r#"
server:
  port: 3000
filters:
  request_log:
    order: -5
routes:
  - id: products
    path_prefix: /api/products
    upstream: http://127.0.0.1:9001
    strip_prefix: true
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.timeout_seconds, 30);
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
        assert!(config.filters.request_log.enabled);
        assert_eq!(config.filters.request_log.order, -5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].id, "products");
        assert!(config.routes[0].strip_prefix);
        assert_eq!(config.routes[0].timeout_ms, 10_000);
    }

    #[test]
    fn disabling_request_log() {
        let config = AppConfig::from_yaml(
            r#"
filters:
  request_log:
    enabled: false
"#,
        )
        .unwrap();

        assert!(!config.filters.request_log.enabled);
        assert_eq!(config.filters.request_log.order, DEFAULT_REQUEST_LOG_ORDER);
    }
}
