//! Per-plan quotas (spec.md §4.3). Checked before state-changing operations;
//! a breach yields [`AppError::PlanLimit`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Starter,
    Growth,
    Scale,
}

#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub max_workers: u32,
    pub max_storage_bytes: u64,
    pub max_bookings_per_month: u32,
}

impl Plan {
    pub fn quota(self) -> Quota {
        match self {
            Plan::Starter => Quota {
                max_workers: 3,
                max_storage_bytes: 5 * 1024 * 1024 * 1024,
                max_bookings_per_month: 150,
            },
            Plan::Growth => Quota {
                max_workers: 15,
                max_storage_bytes: 50 * 1024 * 1024 * 1024,
                max_bookings_per_month: 1_000,
            },
            Plan::Scale => Quota {
                max_workers: 200,
                max_storage_bytes: 500 * 1024 * 1024 * 1024,
                max_bookings_per_month: 20_000,
            },
        }
    }
}

/// Check a single usage counter against its quota ceiling.
pub fn check_quota(used: u64, limit: u64, resource: &str) -> Result<(), AppError> {
    if used >= limit {
        return Err(AppError::PlanLimit(format!(
            "{resource} limit reached ({used}/{limit})"
        )));
    }
    Ok(())
}

/// The org's plan, looked up from its `organizations` row. Missing row or
/// unrecognized value falls back to `Plan::Starter` — the smallest ceiling,
/// so an unprovisioned org fails closed rather than open. Takes
/// `PgExecutor` so callers with only a transaction in hand (e.g. a photo
/// upload already inside its business transaction) don't need a separate
/// pool handle.
pub async fn plan_for_org<'e, E>(executor: E, org_id: Uuid) -> Result<Plan, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT plan FROM organizations WHERE id = $1")
        .bind(org_id)
        .fetch_optional(executor)
        .await?;
    Ok(match row.as_deref() {
        Some(("growth",)) => Plan::Growth,
        Some(("scale",)) => Plan::Scale,
        _ => Plan::Starter,
    })
}

/// Enforce `max_bookings_per_month` before creating a booking. Counts
/// non-cancelled bookings in the org starting this calendar month.
pub async fn enforce_booking_quota<'e, E>(executor: E, org_id: Uuid, plan: Plan) -> Result<(), AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM bookings
         WHERE org_id = $1 AND status <> 'cancelled' AND starts_at >= date_trunc('month', now())",
    )
    .bind(org_id)
    .fetch_one(executor)
    .await?;
    check_quota(count as u64, plan.quota().max_bookings_per_month as u64, "bookings_per_month")
}

/// Enforce `max_workers` before inviting a new user into the org.
pub async fn enforce_worker_quota<'e, E>(executor: E, org_id: Uuid, plan: Plan) -> Result<(), AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM users WHERE org_id = $1")
        .bind(org_id)
        .fetch_one(executor)
        .await?;
    check_quota(count as u64, plan.quota().max_workers as u64, "workers")
}

/// Enforce `max_storage_bytes` before accepting an upload of `incoming_bytes`.
pub async fn enforce_storage_quota<'e, E>(
    executor: E,
    org_id: Uuid,
    plan: Plan,
    incoming_bytes: u64,
) -> Result<(), AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let (used,): (Option<i64>,) = sqlx::query_as("SELECT sum(size)::bigint FROM photos WHERE org_id = $1")
        .bind(org_id)
        .fetch_one(executor)
        .await?;
    let used = used.unwrap_or(0) as u64 + incoming_bytes;
    check_quota(used, plan.quota().max_storage_bytes, "storage_bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_quota_is_smallest() {
        assert!(Plan::Starter.quota().max_workers < Plan::Growth.quota().max_workers);
        assert!(Plan::Growth.quota().max_workers < Plan::Scale.quota().max_workers);
    }

    #[test]
    fn check_quota_rejects_at_ceiling() {
        assert!(check_quota(150, 150, "bookings").is_err());
        assert!(check_quota(149, 150, "bookings").is_ok());
    }
}
