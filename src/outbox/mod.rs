//! Outbox Engine (spec.md §4.5): durable at-least-once delivery for
//! transactional side effects. `enqueue` runs inside the caller's business
//! transaction; `drain_due` is driven by the scheduler's `outbox_drain` job.

pub mod dlq;
pub mod email;
pub mod event;
pub mod storage_delete;
pub mod webhook;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::scheduler::backoff::{next_backoff, BackoffConfig};
use crate::storage::ObjectStore;

/// Outbox job kinds. The dispatcher in `drain_due` matches on this to pick
/// a handler; handlers must be idempotent under re-delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
pub enum OutboxKind {
    Email,
    ExportWebhook,
    IntegrationEvent,
    StorageDelete,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxItem {
    pub id: Uuid,
    pub org_id: Uuid,
    pub kind: OutboxKind,
    pub dedupe_key: String,
    pub payload: Value,
    pub status: String,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub leased_by: Option<String>,
    pub leased_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// `(org_id, dedupe_key)` uniqueness makes this safe to call from a retried
/// caller: the UPSERT turns a duplicate enqueue into a no-op that returns
/// the original row's id.
pub async fn enqueue(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    kind: OutboxKind,
    dedupe_key: &str,
    payload: Value,
) -> Result<Uuid, AppError> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO outbox_items (id, org_id, kind, dedupe_key, payload, status, attempts, next_attempt_at)
         VALUES ($1, $2, $3, $4, $5, 'PENDING', 0, now())
         ON CONFLICT (org_id, dedupe_key) DO UPDATE SET dedupe_key = outbox_items.dedupe_key
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(kind)
    .bind(dedupe_key)
    .bind(payload)
    .fetch_one(&mut **txn)
    .await?;
    Ok(row.0)
}

const LEASE_TIMEOUT_SECS: i64 = 300;

/// Claim up to `batch_size` due PENDING rows (or reclaimable stale leases),
/// marking them IN_FLIGHT with this worker's lease stamp. The predicated
/// update is what makes this safe under multiple concurrent workers.
pub async fn claim_due(pool: &PgPool, worker_id: &str, batch_size: i64) -> Result<Vec<OutboxItem>, AppError> {
    let rows: Vec<OutboxItem> = sqlx::query_as(
        "UPDATE outbox_items SET status = 'IN_FLIGHT', leased_by = $1, leased_at = now()
         WHERE id IN (
             SELECT id FROM outbox_items
             WHERE (status = 'PENDING' AND next_attempt_at <= now())
                OR (status = 'IN_FLIGHT' AND leased_at <= now() - make_interval(secs => $3))
             ORDER BY next_attempt_at
             LIMIT $2
             FOR UPDATE SKIP LOCKED
         )
         RETURNING id, org_id, kind, dedupe_key, payload, status, attempts, next_attempt_at, leased_by, leased_at, last_error",
    )
    .bind(worker_id)
    .bind(batch_size)
    .bind(LEASE_TIMEOUT_SECS as f64)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub enum DispatchOutcome {
    Delivered,
    /// Transient failure: retry with backoff.
    Retry(String),
    /// Permanent failure (4xx from destination, poison payload): DEAD now.
    Poison(String),
    /// Destination blocked by policy (private IP, non-allowlisted host).
    Blocked(String),
}

async fn mark_outcome(
    pool: &PgPool,
    item: &OutboxItem,
    outcome: DispatchOutcome,
    max_attempts: u32,
    base_backoff_secs: u64,
) -> Result<(), AppError> {
    match outcome {
        DispatchOutcome::Delivered => {
            sqlx::query("UPDATE outbox_items SET status = 'DELIVERED', leased_by = NULL WHERE id = $1")
                .bind(item.id)
                .execute(pool)
                .await?;
        }
        DispatchOutcome::Retry(err) => {
            let attempts = item.attempts + 1;
            if attempts as u32 >= max_attempts {
                sqlx::query(
                    "UPDATE outbox_items SET status = 'DEAD', attempts = $2, last_error = $3, leased_by = NULL
                     WHERE id = $1",
                )
                .bind(item.id)
                .bind(attempts)
                .bind(err)
                .execute(pool)
                .await?;
            } else {
                let delay = next_backoff(
                    attempts as u32,
                    &BackoffConfig { base_ms: base_backoff_secs * 1000, ..BackoffConfig::default() },
                );
                sqlx::query(
                    "UPDATE outbox_items
                     SET status = 'PENDING', attempts = $2, last_error = $3, leased_by = NULL,
                         next_attempt_at = now() + make_interval(secs => $4)
                     WHERE id = $1",
                )
                .bind(item.id)
                .bind(attempts)
                .bind(err)
                .bind(delay.as_secs_f64())
                .execute(pool)
                .await?;
            }
        }
        DispatchOutcome::Poison(err) | DispatchOutcome::Blocked(err) => {
            sqlx::query(
                "UPDATE outbox_items SET status = 'DEAD', last_error = $2, leased_by = NULL WHERE id = $1",
            )
            .bind(item.id)
            .bind(err)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Drive one claimed item through its handler and persist the outcome.
pub async fn dispatch_one(
    pool: &PgPool,
    item: OutboxItem,
    http: &reqwest::Client,
    store: &dyn ObjectStore,
    export_allowlist: &[String],
    export_https_only: bool,
    export_block_private_ips: bool,
    max_attempts: u32,
    base_backoff_secs: u64,
) -> Result<(), AppError> {
    let outcome = match item.kind {
        OutboxKind::Email => email::handle(&item).await,
        OutboxKind::ExportWebhook => {
            webhook::handle(&item, http, export_allowlist, export_https_only, export_block_private_ips).await
        }
        OutboxKind::IntegrationEvent => event::handle(&item).await,
        OutboxKind::StorageDelete => storage_delete::handle(&item, store).await,
    };
    mark_outcome(pool, &item, outcome, max_attempts, base_backoff_secs).await
}

/// `drain_due` — called by the scheduler's `outbox_drain` job.
pub async fn drain_due(
    pool: &PgPool,
    worker_id: &str,
    batch_size: i64,
    http: &reqwest::Client,
    store: &dyn ObjectStore,
    export_allowlist: &[String],
    export_https_only: bool,
    export_block_private_ips: bool,
    max_attempts: u32,
    base_backoff_secs: u64,
) -> Result<usize, AppError> {
    let items = claim_due(pool, worker_id, batch_size).await?;
    let count = items.len();
    for item in items {
        dispatch_one(
            pool,
            item,
            http,
            store,
            export_allowlist,
            export_https_only,
            export_block_private_ips,
            max_attempts,
            base_backoff_secs,
        )
        .await?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_timeout_is_positive() {
        assert!(LEASE_TIMEOUT_SECS > 0);
    }
}
