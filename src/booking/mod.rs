//! Booking State Machine (spec.md §4.7): slot reservation, deposit
//! coordination, and the confirm/cancel/reschedule/complete lifecycle.
//! Grounded in the same "serialize contested resources with an explicit
//! lock" posture the teacher uses for its account pool
//! (`scheduler/accounts.rs`) — here the contested resource is a team's
//! time slot, locked with `SELECT … FOR UPDATE`.

pub mod deposit;
pub mod fsm;
pub mod slot;
pub mod webhook;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::leads::credit;
use crate::outbox::{self, OutboxKind};

pub use fsm::{Action, BookingStatus};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub org_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
    pub status: BookingStatus,
    pub deposit_required: bool,
    pub deposit_session_id: Option<String>,
    pub deposit_paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct NewBooking {
    pub org_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub team_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
}

/// `POST /v1/bookings`: lock the team's slot, check for an overlap, decide
/// the deposit policy, insert the row in its starting status, and enqueue
/// the corresponding lifecycle email — all inside one transaction so the
/// slot lock, the row, and the outbox row are atomic together.
pub async fn create(
    txn: &mut Transaction<'_, Postgres>,
    input: NewBooking,
    request_id: &str,
) -> Result<Booking, AppError> {
    slot::lock_team(txn, input.org_id, input.team_id).await?;

    let overlap = slot::overlaps(
        txn,
        input.org_id,
        input.team_id,
        input.starts_at,
        input.duration_min,
        None,
    )
    .await?;
    if overlap {
        return Err(AppError::SlotTaken);
    }

    let deposit_required = deposit::requires_deposit(&deposit::BookingContext {
        starts_at: input.starts_at,
        duration_min: input.duration_min,
        is_new_client: input.lead_id.is_none(),
    });

    let status = if deposit_required { BookingStatus::AwaitingDeposit } else { BookingStatus::Confirmed };
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO bookings (id, org_id, lead_id, team_id, starts_at, duration_min, status, deposit_required, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())",
    )
    .bind(id)
    .bind(input.org_id)
    .bind(input.lead_id)
    .bind(input.team_id)
    .bind(input.starts_at)
    .bind(input.duration_min)
    .bind(status)
    .bind(deposit_required)
    .execute(&mut **txn)
    .await?;

    let template = if deposit_required { "booking_pending_deposit" } else { "booking_confirmed" };
    enqueue_lifecycle_email(txn, input.org_id, id, template, request_id).await?;

    if status == BookingStatus::Confirmed {
        if let Some(lead_id) = input.lead_id {
            credit::resolve_on_confirm(txn, input.org_id, lead_id).await?;
        }
    }

    Ok(Booking {
        id,
        org_id: input.org_id,
        lead_id: input.lead_id,
        team_id: Some(input.team_id),
        starts_at: input.starts_at,
        duration_min: input.duration_min,
        status,
        deposit_required,
        deposit_session_id: None,
        deposit_paid_at: None,
        created_at: Utc::now(),
    })
}

pub async fn get(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    let row: Option<Booking> = sqlx::query_as(
        "SELECT id, org_id, lead_id, team_id, starts_at, duration_min, status, deposit_required,
                deposit_session_id, deposit_paid_at, created_at
         FROM bookings WHERE id = $1 AND org_id = $2",
    )
    .bind(booking_id)
    .bind(org_id)
    .fetch_optional(&mut **txn)
    .await?;
    row.ok_or(AppError::NotFound { resource: "booking" })
}

/// Apply an FSM action to a booking, persisting the new status iff the
/// transition is legal, and enqueue whatever lifecycle side-effect follows
/// from it. Returns `CONFLICT` (no state change) for any action not in the
/// allowed transition table — invariant 4 (§8).
pub async fn apply_action(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    booking_id: Uuid,
    action: Action,
    request_id: &str,
) -> Result<Booking, AppError> {
    let current = get(txn, org_id, booking_id).await?;
    let next = fsm::transition(current.status, action)?;

    sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND org_id = $2")
        .bind(booking_id)
        .bind(org_id)
        .bind(next)
        .execute(&mut **txn)
        .await?;

    if let Some(template) = lifecycle_email_for(next) {
        enqueue_lifecycle_email(txn, org_id, booking_id, template, request_id).await?;
    }

    if let Some(lead_id) = current.lead_id {
        match next {
            BookingStatus::Confirmed => credit::resolve_on_confirm(txn, org_id, lead_id).await?,
            BookingStatus::Cancelled => credit::resolve_on_cancel(txn, org_id, lead_id).await?,
            _ => {}
        }
    }

    Ok(Booking { status: next, ..current })
}

fn lifecycle_email_for(status: BookingStatus) -> Option<&'static str> {
    match status {
        BookingStatus::Confirmed => Some("booking_confirmed"),
        BookingStatus::Cancelled => Some("booking_cancelled"),
        _ => None,
    }
}

async fn enqueue_lifecycle_email(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    booking_id: Uuid,
    template: &str,
    request_id: &str,
) -> Result<(), AppError> {
    let dedupe_key = format!("{booking_id}:{template}");
    let payload: Value = serde_json::json!({
        "template": template,
        "to": "booking-contact",
        "booking_id": booking_id,
        "request_id": request_id,
    });
    outbox::enqueue(txn, org_id, OutboxKind::Email, &dedupe_key, payload).await?;
    Ok(())
}

/// Sweep `PENDING`/`AWAITING_DEPOSIT` bookings whose hold has outlived its
/// TTL into `EXPIRED`, releasing their slot. Driven by the scheduler's
/// `booking_sweep` job, not by request traffic.
pub async fn sweep_expired(pool: &sqlx::PgPool, ttl_minutes: i64) -> Result<u64, AppError> {
    let cutoff = Utc::now() - Duration::minutes(ttl_minutes);
    let result = sqlx::query(
        "UPDATE bookings SET status = 'EXPIRED'
         WHERE status IN ('PENDING', 'AWAITING_DEPOSIT') AND created_at <= $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Enqueue a reminder email for every `CONFIRMED` booking starting within
/// `window_hours`. The outbox dedupe key is keyed on the booking alone
/// (not the poll time), so re-running this job every interval before the
/// booking starts is safe — the second and later enqueues are no-ops
/// against the first.
pub async fn enqueue_due_reminders(pool: &sqlx::PgPool, window_hours: i64, request_id: &str) -> Result<usize, AppError> {
    let horizon = Utc::now() + Duration::hours(window_hours);
    let due: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT org_id, id FROM bookings
         WHERE status = 'CONFIRMED' AND starts_at <= $1 AND starts_at > now()",
    )
    .bind(horizon)
    .fetch_all(pool)
    .await?;

    let mut enqueued = 0usize;
    for (org_id, booking_id) in due {
        let mut txn = crate::db::begin_tenant_txn(pool, org_id).await?;
        enqueue_lifecycle_email(&mut txn, org_id, booking_id, "booking_reminder", request_id).await?;
        txn.commit().await?;
        enqueued += 1;
    }
    Ok(enqueued)
}

/// Move a non-terminal booking to a new time, re-checking slot exclusivity
/// under the same team lock `create` uses. Not an FSM action — rescheduling
/// changes `starts_at`, not `status` — so it lives beside `apply_action`
/// rather than inside `fsm::transition`.
pub async fn reschedule(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    booking_id: Uuid,
    new_starts_at: DateTime<Utc>,
    new_duration_min: i32,
    request_id: &str,
) -> Result<Booking, AppError> {
    let current = get(txn, org_id, booking_id).await?;
    if current.status.is_terminal() {
        return Err(AppError::conflict("cannot reschedule a terminal booking"));
    }
    let team_id = current.team_id.ok_or_else(|| AppError::conflict("booking has no assigned team to reschedule"))?;

    slot::lock_team(txn, org_id, team_id).await?;
    let overlap = slot::overlaps(txn, org_id, team_id, new_starts_at, new_duration_min, Some(booking_id)).await?;
    if overlap {
        return Err(AppError::SlotTaken);
    }

    sqlx::query("UPDATE bookings SET starts_at = $3, duration_min = $4 WHERE id = $1 AND org_id = $2")
        .bind(booking_id)
        .bind(org_id)
        .bind(new_starts_at)
        .bind(new_duration_min)
        .execute(&mut **txn)
        .await?;

    enqueue_lifecycle_email(txn, org_id, booking_id, "booking_rescheduled", request_id).await?;

    Ok(Booking { starts_at: new_starts_at, duration_min: new_duration_min, ..current })
}
