//! The closed sum of domain error kinds (§7) and the single place that
//! translates them into the Problem-Details HTTP envelope.
//!
//! Domain components (booking, invoice, lead, photo, identity, …) return
//! `Result<T, AppError>`. Nothing downstream of a repository call constructs
//! an HTTP status directly — `AppError::into_response` in `http::error` is
//! the one translation point, per the "ad-hoc exception classes" redesign
//! flag in SPEC_FULL.md §9.

use thiserror::Error;

/// Stable, machine-readable error kind. Each variant maps to exactly one
/// HTTP status and one `type` URI suffix in `http::error`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("conflict: {0}")]
    Conflict(String),

    /// A booking slot is already held by a non-cancelled booking.
    #[error("slot already taken")]
    SlotTaken,

    /// Attempted booking state transition is not in the allowed set.
    #[error("invalid booking transition from {from} via {action}")]
    InvalidTransition { from: String, action: String },

    /// Idempotency-Key replay with a different body hash under the same key.
    #[error("idempotency key reused with a different request body")]
    IdempotencyMismatch,

    #[error("plan limit exceeded: {0}")]
    PlanLimit(String),

    #[error("rate limited")]
    RateLimited,

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Bad webhook signature, blocked export destination, etc.
    #[error("integration rejected: {0}")]
    IntegrationRejected(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: &'static str) -> Self {
        AppError::NotFound { resource }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound { resource: "row" },
            other => AppError::DependencyUnavailable(format!("database: {other}")),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
