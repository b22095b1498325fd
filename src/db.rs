//! Postgres connection pool and the tenant-scoped transaction helper.
//!
//! Every write handler opens exactly one transaction per request
//! (SPEC_FULL.md §5). `with_tenant_txn` additionally issues
//! `SET LOCAL app.current_org_id` so a row-level security policy can refuse
//! cross-org reads as a defense-in-depth safety net — explicit `org_id`
//! predicates in each repository query remain mandatory; this is a second
//! line of defense, not a replacement.

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;

/// Default timeout applied to individual statements beyond what the pool's
/// own `acquire_timeout` covers. Mirrors the `with_timeout` helper pattern
/// used for every query in the teacher's SQLite storage layer.
pub async fn with_timeout<T>(
    seconds: u64,
    fut: impl std::future::Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(std::time::Duration::from_secs(seconds), fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::DependencyUnavailable(format!(
            "database operation timed out after {seconds}s"
        ))),
    }
}

pub async fn connect(database_url: &str, pool_size: u32, statement_timeout_secs: u64) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(pool_size)
        .acquire_timeout(std::time::Duration::from_secs(statement_timeout_secs))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Open a transaction and bind `app.current_org_id` for the lifetime of
/// that transaction (Postgres `SET LOCAL` is transaction-scoped, so this
/// never leaks across pooled connections).
pub async fn begin_tenant_txn<'a>(
    pool: &'a PgPool,
    org_id: Uuid,
) -> Result<Transaction<'a, Postgres>, AppError> {
    let mut txn = pool.begin().await?;
    sqlx::query("SELECT set_config('app.current_org_id', $1, true)")
        .bind(org_id.to_string())
        .execute(&mut *txn)
        .await?;
    Ok(txn)
}
