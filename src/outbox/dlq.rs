//! Dead-letter surface: listing and replay, both scoped to the caller's org
//! (spec.md §4.5). Replay resets `attempts` to 0 and `status` to `PENDING`
//! with `next_attempt_at = now()` so the next `drain_due` pass picks it up
//! immediately.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

use super::OutboxItem;

/// List dead-lettered events for `org_id`, most recent first.
pub async fn list_dead(pool: &PgPool, org_id: Uuid, limit: i64) -> Result<Vec<OutboxItem>, AppError> {
    let rows: Vec<OutboxItem> = sqlx::query_as(
        "SELECT id, org_id, kind, dedupe_key, payload, status, attempts, next_attempt_at,
                leased_by, leased_at, last_error
         FROM outbox_items
         WHERE org_id = $1 AND status = 'DEAD'
         ORDER BY next_attempt_at DESC
         LIMIT $2",
    )
    .bind(org_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Replay a dead-lettered event: resets it to `PENDING` with a zeroed
/// attempt count, scoped to `org_id` so one tenant cannot replay another's
/// event by guessing an id.
pub async fn replay(pool: &PgPool, org_id: Uuid, event_id: Uuid) -> Result<OutboxItem, AppError> {
    let row: Option<OutboxItem> = sqlx::query_as(
        "UPDATE outbox_items
         SET status = 'PENDING', attempts = 0, next_attempt_at = $3, last_error = NULL, leased_by = NULL
         WHERE id = $1 AND org_id = $2 AND status = 'DEAD'
         RETURNING id, org_id, kind, dedupe_key, payload, status, attempts, next_attempt_at,
                   leased_by, leased_at, last_error",
    )
    .bind(event_id)
    .bind(org_id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    row.ok_or(AppError::NotFound { resource: "dead_letter_event" })
}

// No #[cfg(test)] module here: both functions are a single scoped SQL
// statement with no branching logic to exercise without a live Postgres
// instance (see DESIGN.md's note on why this repo carries no DB-backed
// integration-test directory).
