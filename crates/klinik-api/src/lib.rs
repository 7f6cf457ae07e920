//! # klinik-api: Clinic Appointment Service
//!
//! Patients book consultations, admins assign a doctor and time slot,
//! doctors record the consultation. Sessions are cookie-based and every
//! route group is gated by role.
//!
//! ## API Surface
//!
//! | Prefix        | Module               | Role     |
//! |---------------|----------------------|----------|
//! | `/`, `/login`, `/logout`, `/register` | [`routes::auth`] | public |
//! | `/pasien/*`   | [`routes::patient`]  | patient  |
//! | `/admin/*`    | [`routes::admin`]    | admin    |
//! | `/dokter/*`   | [`routes::doctor`]   | doctor   |
//! | `/health/*`, `/metrics`, `/openapi.json` | this module | public |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → require_auth → require_role → Handler
//! ```
//!
//! ## Persistence
//!
//! Postgres when `DATABASE_URL` is set, otherwise the in-memory store.

pub mod db;
pub mod error;
pub mod extractors;
pub mod lifecycle;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod views;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};

use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside the trace and metrics
/// layers so scrapes do not count themselves.
pub fn app(state: AppState) -> Router {
    let pages = Router::new()
        .merge(routes::auth::router())
        .merge(routes::patient::router())
        .merge(routes::admin::router())
        .merge(routes::doctor::router())
        .merge(openapi::router())
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(Extension(state.session.clone()))
        .with_state(state.clone());

    let ops = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    Router::new().merge(ops).merge(pages)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 when the store answers, 503 otherwise.
async fn readiness(State(state): State<AppState>) -> Response {
    match state.clinic.store().ping().await {
        Ok(()) => "ready".into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
