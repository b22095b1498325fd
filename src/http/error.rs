//! The Problem-Details error envelope (spec.md §4.12, §7) and the single
//! `IntoResponse` impl that translates [`AppError`] into it. Every handler
//! in `http::routes` returns `Result<_, AppError>` and lets this be the
//! only place that picks an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: &'static str,
    pub title: &'static str,
    pub status: u16,
    pub detail: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Status policy (spec.md §4.12): 422 validation, 400/409 business
/// conflicts, 401 missing/invalid credentials, 403 authenticated-but-
/// disallowed, 402 plan limit, 404 missing-in-org, 429 rate limit.
fn status_and_type(err: &AppError) -> (StatusCode, &'static str, &'static str) {
    match err {
        AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation-failed", "Validation Failed"),
        AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", "Unauthenticated"),
        AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", "Forbidden"),
        AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "not-found", "Not Found"),
        AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", "Conflict"),
        AppError::SlotTaken => (StatusCode::CONFLICT, "slot-taken", "Slot Already Taken"),
        AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid-transition", "Invalid Booking Transition"),
        AppError::IdempotencyMismatch => (StatusCode::CONFLICT, "idempotency-mismatch", "Idempotency Key Reused"),
        AppError::PlanLimit(_) => (StatusCode::PAYMENT_REQUIRED, "plan-limit", "Plan Limit Exceeded"),
        AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate-limited", "Rate Limited"),
        AppError::DependencyUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "dependency-unavailable", "Dependency Unavailable")
        }
        AppError::IntegrationRejected(_) => (StatusCode::BAD_REQUEST, "integration-rejected", "Integration Rejected"),
        AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal Error"),
    }
}

/// Request-scoped wrapper so handlers can attach the request id without
/// threading it through every `AppError` variant.
pub struct AppErrorResponse {
    pub request_id: String,
    pub error: AppError,
}

impl IntoResponse for AppErrorResponse {
    fn into_response(self) -> Response {
        let (status, problem_type, title) = status_and_type(&self.error);
        let body = ProblemDetails {
            problem_type,
            title,
            status: status.as_u16(),
            detail: self.error.to_string(),
            request_id: self.request_id,
            errors: Vec::new(),
        };
        (status, Json(body)).into_response()
    }
}
