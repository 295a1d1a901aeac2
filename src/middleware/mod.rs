// =============================================================================
// MIDDLEWARE MODULE
// =============================================================================
// Request-wide layers that are not provided by tower-http:
//
// - rate_limit: per-IP request budgets (general and auth)
// - security:   hardening response headers
// - track_http_metrics (below): request counter and latency histogram,
//   labelled by the matched route so ids never explode label cardinality
// =============================================================================

pub mod rate_limit;
pub mod security;

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use crate::metrics;

pub use rate_limit::{rate_limit, RateLimiter};
pub use security::security_headers;

pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics::record_http_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
