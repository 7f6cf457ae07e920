//! # Middleware
//!
//! Cross-cutting request processing: Prometheus request metrics and
//! `tower_http` trace spans. Session and role gating lives in
//! `crate::session`.

pub mod metrics;
pub mod tracing_layer;
