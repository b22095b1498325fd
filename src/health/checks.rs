//! Individual health/readiness checks. [`DatabaseHealthCheck`] backs
//! `/v1/healthz`; [`JobHeartbeatCheck`] backs `/v1/readyz` in strict mode
//! (spec.md §4.11); [`StorageHealthCheck`] probes whichever
//! [`crate::storage::ObjectStore`] backend is configured.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;

use crate::scheduler::heartbeat::{self, JobHeartbeat};
use crate::storage::ObjectStore;

/// Severity level reported by a health check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Degraded,
    Critical,
}

impl CheckStatus {
    /// Returns the worst (highest-severity) of two statuses.
    pub fn worst(a: CheckStatus, b: CheckStatus) -> CheckStatus {
        match (&a, &b) {
            (CheckStatus::Critical, _) | (_, CheckStatus::Critical) => CheckStatus::Critical,
            (CheckStatus::Degraded, _) | (_, CheckStatus::Degraded) => CheckStatus::Degraded,
            _ => CheckStatus::Ok,
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "ok"),
            CheckStatus::Degraded => write!(f, "degraded"),
            CheckStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Result of running a single health check.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub message: String,
    pub status: CheckStatus,
    pub checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckResult {
    fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status: CheckStatus::Ok,
            checked_at: Utc::now().to_rfc3339(),
            latency_ms: None,
        }
    }

    fn ok_with_latency(name: impl Into<String>, message: impl Into<String>, latency_ms: u64) -> Self {
        Self { latency_ms: Some(latency_ms), ..Self::ok(name, message) }
    }

    fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status: CheckStatus::Degraded,
            checked_at: Utc::now().to_rfc3339(),
            latency_ms: None,
        }
    }

    fn critical(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status: CheckStatus::Critical,
            checked_at: Utc::now().to_rfc3339(),
            latency_ms: None,
        }
    }
}

/// Async health check trait. Implemented by each subsystem probe
/// aggregated by [`crate::health::reporter::HealthReporter`].
#[async_trait]
pub trait SystemHealthCheck: Send + Sync {
    async fn run(&self) -> CheckResult;
}

// ─── Database check ─────────────────────────────────────────────────────────

/// Checks that the Postgres pool can execute a trivial round-trip query.
pub struct DatabaseHealthCheck {
    pool: PgPool,
}

impl DatabaseHealthCheck {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SystemHealthCheck for DatabaseHealthCheck {
    async fn run(&self) -> CheckResult {
        let start = std::time::Instant::now();
        let result: Result<(i32,), sqlx::Error> = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => CheckResult::ok_with_latency("database", format!("postgres reachable ({latency_ms}ms)"), latency_ms),
            Err(e) => CheckResult::critical("database", format!("postgres query failed: {e}")),
        }
    }
}

// ─── Job heartbeat check (readiness) ────────────────────────────────────────

/// Checks that every job named in `required` has beaten within `ttl_secs`.
/// In non-strict mode a stale heartbeat degrades rather than fails
/// readiness — the operator opts into hard failure via
/// `job_heartbeat_required` (spec.md §4.11).
pub struct JobHeartbeatCheck {
    pool: PgPool,
    required: Vec<&'static str>,
    ttl_secs: i64,
    strict: bool,
}

impl JobHeartbeatCheck {
    pub fn new(pool: PgPool, required: Vec<&'static str>, ttl_secs: i64, strict: bool) -> Self {
        Self { pool, required, ttl_secs, strict }
    }
}

#[async_trait]
impl SystemHealthCheck for JobHeartbeatCheck {
    async fn run(&self) -> CheckResult {
        let beats: Vec<JobHeartbeat> = match heartbeat::all(&self.pool).await {
            Ok(b) => b,
            Err(e) => return CheckResult::critical("job_heartbeats", format!("could not read heartbeats: {e}")),
        };

        if heartbeat::all_fresh(&beats, &self.required, self.ttl_secs) {
            CheckResult::ok("job_heartbeats", format!("{} required jobs within TTL", self.required.len()))
        } else if self.strict {
            CheckResult::critical("job_heartbeats", "one or more required jobs exceeded heartbeat TTL")
        } else {
            CheckResult::degraded("job_heartbeats", "one or more required jobs exceeded heartbeat TTL (non-strict)")
        }
    }
}

// ─── Storage check ───────────────────────────────────────────────────────────

/// Probes whichever [`ObjectStore`] backend is configured via a cheap
/// signed-URL mint — no bytes move, so this is safe to run on every
/// `/v1/healthz` poll.
pub struct StorageHealthCheck {
    store: Arc<dyn ObjectStore>,
}

impl StorageHealthCheck {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SystemHealthCheck for StorageHealthCheck {
    async fn run(&self) -> CheckResult {
        match self.store.sign_download("health/probe", 5).await {
            Ok(_) => CheckResult::ok("storage", "storage gateway signs download urls"),
            Err(e) => CheckResult::degraded("storage", format!("storage gateway probe failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_status_prefers_critical() {
        assert_eq!(CheckStatus::worst(CheckStatus::Ok, CheckStatus::Critical), CheckStatus::Critical);
        assert_eq!(CheckStatus::worst(CheckStatus::Degraded, CheckStatus::Ok), CheckStatus::Degraded);
        assert_eq!(CheckStatus::worst(CheckStatus::Ok, CheckStatus::Ok), CheckStatus::Ok);
    }
}
