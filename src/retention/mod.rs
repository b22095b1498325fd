//! Retention Sweeps (spec.md §4.11, §9 GDPR erasure note): the two jobs
//! that turn `retention_days` from a config number into actual erasure —
//! `retention_cleanup` scrubs PII off leads (and old admin idempotency
//! records) past the window, `storage_janitor` walks terminal bookings'
//! photos past the window and routes their deletion through
//! [`crate::photos::delete`] so the erasure cascades through the outbox
//! into the storage backend instead of stopping at the lead row. The
//! source system's retention sweep covered leads and chat but left photo
//! objects dangling; making the photo side total closes that gap rather
//! than reproducing it (SPEC_FULL.md §9 Open Question).

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::storage::ObjectStore;

/// Null out every PII-bearing field on leads that reached a terminal
/// status (`DONE`/`CANCELLED`) more than `retention_days` ago. The row
/// itself is kept (referral codes and credit ledgers still reference it)
/// — only the contact fields and the estimate snapshot are erased.
pub async fn sweep_leads(pool: &PgPool, retention_days: u32) -> Result<u64, AppError> {
    let cutoff = Utc::now() - Duration::days(retention_days as i64);
    let result = sqlx::query(
        "UPDATE leads SET contact_name = '[erased]', contact_phone = '[erased]',
                contact_email = NULL, contact_address = NULL, estimate_snapshot = '{}'::jsonb
         WHERE status IN ('DONE', 'CANCELLED') AND created_at <= $1
           AND contact_name <> '[erased]'",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Find photos attached to terminal bookings older than `retention_days`
/// and erase them through the same DB-row-then-storage-delete path a
/// manual delete uses, one tenant transaction per photo so a failure
/// partway through only loses progress on that single row.
pub async fn sweep_photos(pool: &PgPool, store: &Arc<dyn ObjectStore>, retention_days: u32, batch_size: i64) -> Result<u64, AppError> {
    let cutoff = Utc::now() - Duration::days(retention_days as i64);
    let candidates: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT p.org_id, p.id FROM photos p
         JOIN bookings b ON b.id = p.booking_id AND b.org_id = p.org_id
         WHERE b.status IN ('DONE', 'CANCELLED', 'EXPIRED') AND p.created_at <= $1
         LIMIT $2",
    )
    .bind(cutoff)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    let mut swept = 0u64;
    for (org_id, photo_id) in candidates {
        let mut txn = crate::db::begin_tenant_txn(pool, org_id).await?;
        crate::photos::delete(&mut txn, org_id, photo_id).await?;
        txn.commit().await?;
        swept += 1;
    }

    // store is only threaded through so the janitor's signature makes the
    // storage dependency explicit even though the actual delete happens
    // later, out-of-line, in the outbox dispatcher.
    let _ = store;
    Ok(swept)
}

#[cfg(test)]
mod tests {
    // Both sweeps are thin SQL plus the already-tested `photos::delete`
    // path; their behavior is covered by the `retention_sweep` integration
    // scenario rather than a unit test here.
}
