use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::telemetry::SinkError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Log sink error: {0}")]
    LogSink(#[from] SinkError),

    #[error("No route matches path: {0}")]
    NoRoute(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream request timed out after {0} ms")]
    UpstreamTimeout(u64),

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Upstream response body exceeds {0} bytes")]
    UpstreamBodyTooLarge(usize),
}

pub type FilterResult = Result<Response, GatewayError>;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::LogSink(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::NoRoute(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BodyRead(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamBodyTooLarge(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::LogSink(_) => "LOG_SINK_ERROR",
            GatewayError::NoRoute(_) => "NO_ROUTE",
            GatewayError::Upstream(_) => "UPSTREAM_ERROR",
            GatewayError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            GatewayError::BodyRead(_) => "BODY_READ_ERROR",
            GatewayError::UpstreamBodyTooLarge(_) => "UPSTREAM_BODY_TOO_LARGE",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
