//! Per-request access log

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::info;

use super::tenant::TENANT_HEADER;
use crate::domain::checkpoint::TenantKey;

/// Logs one line when a request arrives and one when it completes.
///
/// `TraceLayer` owns the request span; this middleware only adds events.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = extract_path(&request);
    let request_id = header_value(request.headers(), "x-request-id").unwrap_or_default();
    let tenant = tenant_for_log(request.headers());

    info!(
        method = %method,
        path = %path,
        tenant = %tenant,
        request_id = %request_id,
        "Incoming request"
    );

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        tenant = %tenant,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        "Request completed"
    );

    response
}

fn extract_path(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn tenant_for_log(headers: &HeaderMap) -> TenantKey {
    header_value(headers, TENANT_HEADER)
        .map(TenantKey::new)
        .unwrap_or_default()
}
