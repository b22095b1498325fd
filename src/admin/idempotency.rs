//! Admin write idempotency (spec.md §4.12, §3 `AdminIdempotency`). The
//! server hashes `(method, path, normalized body)`; a retry presenting the
//! same `Idempotency-Key` and the same hash replays the stored response, a
//! retry with a different body under the same key is a conflict.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use sha2::{Digest, Sha256};

use crate::error::AppError;

pub enum Outcome {
    /// No prior record — caller should process the request and call
    /// [`store`] with the result.
    Fresh,
    /// Same key, same body hash — caller should return this stored
    /// response verbatim without re-running the handler.
    Replay { status: i32, body: Value },
}

/// Normalize the request body to a canonical byte form before hashing so
/// insignificant whitespace differences between otherwise-identical retries
/// don't register as a different request.
pub fn body_hash(body: &[u8]) -> String {
    let normalized: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let canonical = serde_json::to_vec(&normalized).unwrap_or_default();
    hex::encode(Sha256::digest(canonical))
}

/// Look up any existing record for `(org_id, method, path, idempotency_key)`.
/// Returns `Outcome::Replay` when the stored body hash matches, or
/// `AppError::IdempotencyMismatch` when it was reused with a different body.
pub async fn check(
    pool: &PgPool,
    org_id: Uuid,
    method: &str,
    path: &str,
    idempotency_key: &str,
    body_hash: &str,
) -> Result<Outcome, AppError> {
    let row: Option<(String, i32, Value)> = sqlx::query_as(
        "SELECT body_hash, response_status, response_blob
         FROM admin_idempotency
         WHERE org_id = $1 AND method = $2 AND path = $3 AND idempotency_key = $4",
    )
    .bind(org_id)
    .bind(method)
    .bind(path)
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await?;

    match row {
        None => Ok(Outcome::Fresh),
        Some((stored_hash, status, body)) if stored_hash == body_hash => Ok(Outcome::Replay { status, body }),
        Some(_) => Err(AppError::IdempotencyMismatch),
    }
}

/// Persist the response for a freshly-processed request so future retries
/// of the same key replay it.
pub async fn store(
    pool: &PgPool,
    org_id: Uuid,
    method: &str,
    path: &str,
    idempotency_key: &str,
    body_hash: &str,
    response_status: i32,
    response_body: &Value,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO admin_idempotency (org_id, method, path, idempotency_key, body_hash, response_status, response_blob, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())
         ON CONFLICT (org_id, method, path, idempotency_key) DO NOTHING",
    )
    .bind(org_id)
    .bind(method)
    .bind(path)
    .bind(idempotency_key)
    .bind(body_hash)
    .bind(response_status)
    .bind(response_body)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop idempotency records older than `ttl_hours` — called from the
/// `retention_cleanup` job so the table doesn't grow without bound.
pub async fn prune_expired(pool: &PgPool, ttl_hours: i64) -> Result<u64, AppError> {
    let cutoff = chrono::Utc::now() - chrono::Duration::hours(ttl_hours);
    let result = sqlx::query("DELETE FROM admin_idempotency WHERE created_at <= $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_payloads_with_different_whitespace_hash_equal() {
        let a = body_hash(br#"{"amount": 100}"#);
        let b = body_hash(br#"{ "amount" : 100 }"#);
        assert_eq!(a, b);
    }

    #[test]
    fn different_payloads_hash_differently() {
        let a = body_hash(br#"{"amount": 100}"#);
        let b = body_hash(br#"{"amount": 200}"#);
        assert_ne!(a, b);
    }
}
