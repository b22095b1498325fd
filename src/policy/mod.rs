//! `policy` — authorization and entitlements.
//!
//! - **RBAC** — static role → permitted-action table (spec.md §4.3).
//! - **Entitlements** — per-plan quotas checked before state-changing
//!   operations.

pub mod entitlements;
pub mod rbac;

// ─── Top-level re-exports ─────────────────────────────────────────────────────

pub use entitlements::{
    check_quota, enforce_booking_quota, enforce_storage_quota, enforce_worker_quota, plan_for_org, Plan, Quota,
};
pub use rbac::{check_authorized, Role};
