//! # Prometheus Metrics
//!
//! Request metrics recorded through the `metrics` facade and exported by
//! `metrics-exporter-prometheus` at `/metrics`:
//!
//! - `klinik_http_requests_total{method, path, status}` (counter)
//! - `klinik_http_request_duration_seconds{method, path}` (histogram)
//!
//! `path` is the matched route template (`/admin/approve/{id}`), never the
//! raw URI, so IDs do not blow up label cardinality. Without an installed
//! recorder the macros are no-ops.

use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "klinik_http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "klinik_http_request_duration_seconds";

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Middleware that records count and latency of every request.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    record(method, path, response.status().as_u16(), started.elapsed());
    response
}

fn record(method: String, path: String, status: u16, elapsed: Duration) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method,
        "path" => path
    )
    .record(elapsed.as_secs_f64());
}
