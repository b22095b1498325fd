//! `JobHeartbeat` (spec.md §3): one row per job, upserted every loop
//! iteration regardless of outcome. `/v1/readyz` reads these rows in
//! strict-heartbeat mode to decide liveness.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobHeartbeat {
    pub job_name: String,
    pub last_beat_at: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
}

/// Record one iteration. `success = false` increments
/// `consecutive_failures`; a success resets it to zero and stamps
/// `last_success_at`.
pub async fn record(pool: &PgPool, job_name: &str, success: bool) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO job_heartbeats (job_name, last_beat_at, last_success_at, consecutive_failures)
         VALUES ($1, now(), CASE WHEN $2 THEN now() ELSE NULL END, CASE WHEN $2 THEN 0 ELSE 1 END)
         ON CONFLICT (job_name) DO UPDATE SET
            last_beat_at = now(),
            last_success_at = CASE WHEN $2 THEN now() ELSE job_heartbeats.last_success_at END,
            consecutive_failures = CASE WHEN $2 THEN 0 ELSE job_heartbeats.consecutive_failures + 1 END",
    )
    .bind(job_name)
    .bind(success)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn all(pool: &PgPool) -> Result<Vec<JobHeartbeat>, AppError> {
    let rows: Vec<JobHeartbeat> = sqlx::query_as(
        "SELECT job_name, last_beat_at, last_success_at, consecutive_failures FROM job_heartbeats",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// `true` if every heartbeat in `required` is younger than `ttl_secs`.
/// A job that has never beaten at all (absent from the table) counts as
/// stale, not as healthy-by-omission.
pub fn all_fresh(heartbeats: &[JobHeartbeat], required: &[&str], ttl_secs: i64) -> bool {
    let now = Utc::now();
    required.iter().all(|name| {
        heartbeats
            .iter()
            .find(|h| h.job_name == *name)
            .map(|h| (now - h.last_beat_at).num_seconds() <= ttl_secs)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hb(name: &str, age_secs: i64) -> JobHeartbeat {
        JobHeartbeat {
            job_name: name.to_string(),
            last_beat_at: Utc::now() - chrono::Duration::seconds(age_secs),
            last_success_at: None,
            consecutive_failures: 0,
        }
    }

    #[test]
    fn fresh_heartbeats_pass() {
        let beats = vec![hb("outbox_drain", 5), hb("booking_sweep", 10)];
        assert!(all_fresh(&beats, &["outbox_drain", "booking_sweep"], 120));
    }

    #[test]
    fn stale_heartbeat_fails() {
        let beats = vec![hb("outbox_drain", 500)];
        assert!(!all_fresh(&beats, &["outbox_drain"], 120));
    }

    #[test]
    fn missing_heartbeat_counts_as_stale() {
        let beats = vec![hb("outbox_drain", 5)];
        assert!(!all_fresh(&beats, &["outbox_drain", "booking_sweep"], 120));
    }
}
