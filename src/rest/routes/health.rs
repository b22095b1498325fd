//! `GET /v1/healthz`, `GET /v1/readyz`, `GET /v1/metrics` (spec.md §4.11,
//! §4.13, §6).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::AppContext;

/// Liveness: always 200 once the process can answer HTTP at all — the
/// individual check results are informational, not gating.
pub async fn healthz(State(ctx): State<AppContext>) -> impl IntoResponse {
    let report = ctx.health.get_health_report().await;
    (StatusCode::OK, Json(report))
}

/// Readiness: the aggregated worst status gates the HTTP code so a load
/// balancer can pull this instance out of rotation on `critical`.
pub async fn readyz(State(ctx): State<AppContext>) -> impl IntoResponse {
    let report = ctx.health.get_health_report().await;
    let status = if report.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}

/// Prometheus text exposition, gated behind a bearer token when configured
/// (spec.md §4.13 — metrics are operational data, not tenant data, but
/// still shouldn't be world-readable by default).
pub async fn metrics(State(ctx): State<AppContext>, headers: HeaderMap) -> impl IntoResponse {
    if !ctx.config.metrics_enabled {
        return (StatusCode::NOT_FOUND, String::new());
    }

    if let Some(expected) = &ctx.config.metrics_token {
        let presented = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return (StatusCode::UNAUTHORIZED, String::new());
        }
    }

    match &ctx.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}
