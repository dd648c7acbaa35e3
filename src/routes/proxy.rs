use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, Uri},
    response::Response,
};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, warn};

use crate::{config::RouteConfig, error::GatewayError, metrics::record_upstream_request, AppState};

/// Connection-scoped headers plus `content-length`, which is recomputed
/// from the forwarded body.
fn is_forwardable(name: &HeaderName) -> bool {
    !matches!(
        name.as_str(),
        "connection"
            | "content-length"
            | "host"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter() {
        if is_forwardable(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

/// Longest matching `path_prefix`, matched on segment boundaries.
pub fn match_route<'a>(routes: &'a [RouteConfig], path: &str) -> Option<&'a RouteConfig> {
    routes
        .iter()
        .filter(|route| {
            let prefix = route.path_prefix.as_str();
            path.strip_prefix(prefix).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/')
            })
        })
        .max_by_key(|route| route.path_prefix.len())
}

pub fn upstream_url(route: &RouteConfig, uri: &Uri) -> String {
    let path = uri.path();
    let forwarded = if route.strip_prefix {
        let rest = path.strip_prefix(route.path_prefix.as_str()).unwrap_or(path);
        if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        }
    } else {
        path.to_string()
    };

    let mut url = format!("{}{}", route.upstream.trim_end_matches('/'), forwarded);
    if let Some(query) = uri.query() {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Buffers the upstream body, refusing to hold more than `limit` bytes.
async fn read_upstream_body(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, GatewayError> {
    if response
        .content_length()
        .is_some_and(|length| length > limit as u64)
    {
        return Err(GatewayError::UpstreamBodyTooLarge(limit));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if bytes.len() + chunk.len() > limit {
            return Err(GatewayError::UpstreamBodyTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Forwards unmatched requests to the upstream of the matching route.
pub async fn proxy(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, GatewayError> {
    let start_time = Instant::now();
    let route = match_route(&state.config.routes, request.uri().path())
        .ok_or_else(|| GatewayError::NoRoute(request.uri().path().to_string()))?;
    let url = upstream_url(route, request.uri());

    let max_body_bytes = state.config.server.max_body_bytes;
    let (parts, body) = request.into_parts();
    let body = body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| GatewayError::BodyRead(e.to_string()))?;

    let mut headers = HeaderMap::new();
    copy_headers(&parts.headers, &mut headers);

    let upstream_request = state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body);

    let upstream_response =
        match timeout(Duration::from_millis(route.timeout_ms), upstream_request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(route = %route.id, error = %e, "Upstream request failed");
                record_upstream_request(&route.id, 502, start_time.elapsed().as_secs_f64());
                return Err(GatewayError::Upstream(e));
            }
            Err(_) => {
                warn!(route = %route.id, timeout_ms = route.timeout_ms, "Upstream request timeout");
                record_upstream_request(&route.id, 504, start_time.elapsed().as_secs_f64());
                return Err(GatewayError::UpstreamTimeout(route.timeout_ms));
            }
        };

    let status = upstream_response.status();
    let upstream_headers = upstream_response.headers().clone();
    let bytes = match read_upstream_body(upstream_response, max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(route = %route.id, error = %e, "Failed to read upstream response body");
            record_upstream_request(&route.id, 502, start_time.elapsed().as_secs_f64());
            return Err(e);
        }
    };

    record_upstream_request(&route.id, status.as_u16(), start_time.elapsed().as_secs_f64());

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    copy_headers(&upstream_headers, response.headers_mut());

    Ok(response)
}
