//! HTTP API Surface (spec.md §4.12): route assembly and the
//! request-scoped middleware every handler runs behind — rate limiting,
//! tracing, CORS, and the handler timeout. Tenant resolution, admin
//! gating, and idempotency are not `tower` layers here; each handler pulls
//! `TenantContext` as an extractor and calls `admin_guard::enforce`
//! explicitly, the same "explicit middleware chain consumed by each
//! handler" redesign SPEC_FULL.md §9 calls for in place of decorator DI.

pub mod admin_guard;
pub mod extract;
pub mod routes;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::http::error::AppErrorResponse;
use crate::telemetry::metrics;
use crate::AppContext;

/// `(client_ip_or_token, route_group)` rate limiting applied to every
/// route ahead of any handler logic (spec.md §4.6). `route_group` is the
/// first path segment after `/v1/` — coarse enough to keep label
/// cardinality bounded, matching the metrics labeling rule in §4.13.
async fn rate_limit_mw(State(ctx): State<AppContext>, req: Request, next: Next) -> Result<Response, AppErrorResponse> {
    let headers = req.headers().clone();
    let connect_info = req.extensions().get::<ConnectInfo<SocketAddr>>().copied();
    let request_id = extract::request_id(&headers);
    let ip = extract::client_ip(&headers, connect_info, &ctx);
    let route_group = req.uri().path().split('/').nth(2).unwrap_or("root").to_string();

    let (allowed, failed_open) = ctx.limiter.check(&ip.to_string(), &route_group, ctx.config.rate_limit_per_min).await;
    if failed_open {
        metrics::record_webhook_outcome("ratelimit_failed_open");
    }
    if !allowed {
        return Err(AppErrorResponse { request_id, error: AppError::RateLimited });
    }

    Ok(next.run(req).await)
}

/// Records the `http_requests_total` / `http_request_duration_seconds`
/// counters from spec.md §4.13 for every request, regardless of outcome.
async fn metrics_mw(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::record_http_request(&path, &method, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}

pub fn build_router(ctx: AppContext) -> Router {
    let cors = if ctx.config.cors_strict {
        let origins: Vec<_> = ctx
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    } else {
        CorsLayer::permissive()
    };

    let handler_timeout = Duration::from_secs(ctx.config.handler_timeout_secs);

    Router::new()
        // Public (spec.md §6)
        .route("/v1/estimate", post(routes::public::estimate))
        .route("/v1/chat/turn", post(routes::public::chat_turn))
        .route("/v1/leads", post(routes::public::create_lead))
        .route("/v1/slots", get(routes::public::list_slots))
        .route("/v1/bookings", post(routes::public::create_booking))
        .route("/v1/stripe/webhook", post(routes::public::stripe_webhook))
        .route("/v1/i/{token}", get(routes::public::get_invoice_by_token))
        .route("/storage/{*key}", get(routes::public::serve_local_storage))
        // Auth / session (spec.md §4.1, §6)
        .route("/v1/auth/login", post(routes::auth::login))
        .route("/v1/auth/refresh", post(routes::auth::refresh))
        .route("/v1/auth/logout", post(routes::auth::logout))
        .route("/v1/auth/me", get(routes::auth::me))
        .route("/v1/auth/change-password", post(routes::auth::change_password))
        // IAM (spec.md §6)
        .route("/v1/iam/users", post(routes::iam::invite_user).get(routes::iam::list_users))
        .route("/v1/iam/users/{id}/reset", post(routes::iam::reset_password))
        .route("/v1/iam/users/logout-all", post(routes::iam::logout_all_for_user))
        // Admin (spec.md §6, gated by admin_guard inside each handler)
        .route("/v1/admin/leads", get(routes::admin::list_leads).post(routes::admin::create_lead))
        .route("/v1/admin/leads/{id}", get(routes::admin::get_lead))
        .route("/v1/admin/bookings/{id}/confirm", post(routes::admin::confirm_booking))
        .route("/v1/admin/bookings/{id}/cancel", post(routes::admin::cancel_booking))
        .route("/v1/admin/bookings/{id}/reschedule", post(routes::admin::reschedule_booking))
        .route("/v1/admin/bookings/{id}/complete", post(routes::admin::complete_booking))
        .route("/v1/admin/bookings/{id}/start", post(routes::admin::start_booking))
        .route("/v1/admin/orders/{id}/invoice", post(routes::admin::create_invoice))
        .route("/v1/admin/invoices/{id}/send", post(routes::admin::send_invoice))
        .route("/v1/admin/invoices/{id}/payments", post(routes::admin::record_payment))
        .route("/v1/admin/invoices/{id}/void", post(routes::admin::void_invoice))
        .route("/v1/admin/outbox/dead-letter", get(routes::admin::list_dead_letter))
        .route("/v1/admin/outbox/dead-letter/{id}/replay", post(routes::admin::replay_dead_letter))
        .route("/v1/admin/export-dead-letter", get(routes::admin::list_export_dead_letter))
        .route("/v1/admin/export-dead-letter/{id}/replay", post(routes::admin::replay_dead_letter))
        .route("/v1/admin/pricing/reload", post(routes::admin::reload_pricing))
        .route("/v1/admin/jobs/status", get(routes::admin::jobs_status))
        .route("/v1/admin/feature-flags", get(routes::admin::get_feature_flags).post(routes::admin::set_feature_flags))
        .route("/v1/admin/break-glass/start", post(routes::admin::start_break_glass))
        .route("/v1/admin/config", get(routes::admin::get_config).post(routes::admin::reload_config))
        .route("/v1/admin/email-scan", post(routes::admin::email_scan))
        .route("/v1/admin/cleanup", post(routes::admin::cleanup))
        .route("/v1/admin/retention/cleanup", post(routes::admin::retention_cleanup))
        // Worker portal (spec.md §6 "Worker and Client portals")
        .route("/v1/worker/bookings/{id}", get(routes::worker::get_booking))
        .route("/v1/worker/bookings/{id}/photos", post(routes::worker::upload_photo))
        // Client portal
        .route("/v1/client/bookings/{id}", get(routes::client::get_booking))
        .route("/v1/client/bookings/{id}/photos", get(routes::client::list_photos))
        .route("/v1/client/bookings/{id}/photos/{photo_id}/download", get(routes::client::download_photo))
        // Health / metrics (spec.md §4.11, §4.13)
        .route("/v1/healthz", get(routes::health::healthz))
        .route("/v1/readyz", get(routes::health::readyz))
        .route("/v1/metrics", get(routes::health::metrics))
        .layer(middleware::from_fn(metrics_mw))
        .layer(middleware::from_fn_with_state(ctx.clone(), rate_limit_mw))
        .layer(TimeoutLayer::new(handler_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}
