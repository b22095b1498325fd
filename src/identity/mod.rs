//! Identity & Session Store (spec.md §4.1): password verification with a
//! current and a legacy hashing scheme, JWT access tokens, opaque refresh
//! tokens, and session rotation/revocation.

pub mod magic_link;
pub mod password;
pub mod session;
pub mod tokens;
pub mod worker_token;

pub use session::{Session, SessionPair};
pub use tokens::AccessClaims;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::policy::Role;

/// A resolved login identifier: never reveals whether the identifier
/// existed when the password check fails, per spec.md §4.1.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRecord {
    id: Uuid,
    org_id: Uuid,
    role: Role,
    password_hash: String,
    must_change_password: bool,
}

/// `Authenticate(credentials)`: verify email+password against the user
/// table, transparently rehashing legacy hashes, and issue a session pair.
pub async fn authenticate(
    pool: &PgPool,
    org_id: Uuid,
    email: &str,
    password: &str,
    auth_secret: &str,
    access_ttl_mins: i64,
    refresh_ttl_days: i64,
    request_id: &str,
) -> Result<(SessionPair, bool), AppError> {
    let user: Option<UserRecord> = sqlx::query_as(
        "SELECT id, org_id, role, password_hash, must_change_password
         FROM users WHERE org_id = $1 AND lower(email) = lower($2)",
    )
    .bind(org_id)
    .bind(email)
    .fetch_optional(pool)
    .await?;

    // Always run a verification even when the user is absent, so the
    // response latency doesn't leak whether the identifier existed.
    let dummy_hash =
        "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$Ysy4V6M1G3CQm8OjbPvf6aGQKsrvOW0EMEcoBDqSgU8";
    let outcome = password::verify_password(password, user.as_ref().map_or(dummy_hash, |u| &u.password_hash));

    let user = match (user, outcome.matches) {
        (Some(u), true) => u,
        _ => return Err(AppError::Unauthenticated),
    };

    if let Some(new_hash) = outcome.rehash {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user.id)
            .bind(new_hash)
            .execute(pool)
            .await?;
    }

    let mut txn = crate::db::begin_tenant_txn(pool, org_id).await?;
    let pair = session::issue(
        &mut txn,
        user.org_id,
        user.id,
        user.role,
        auth_secret,
        access_ttl_mins,
        refresh_ttl_days,
        request_id,
    )
    .await?;
    txn.commit().await?;

    Ok((pair, user.must_change_password))
}

/// `Refresh(refresh_token)`.
pub async fn refresh(
    pool: &PgPool,
    refresh_token: &str,
    auth_secret: &str,
    access_ttl_mins: i64,
    refresh_ttl_days: i64,
    request_id: &str,
) -> Result<SessionPair, AppError> {
    session::rotate(
        pool,
        refresh_token,
        auth_secret,
        access_ttl_mins,
        refresh_ttl_days,
        request_id,
    )
    .await
}

/// `Revoke(session_id, reason)`.
pub async fn revoke_session(pool: &PgPool, session_id: Uuid, reason: &str) -> Result<u64, AppError> {
    session::revoke_one(pool, session_id, reason).await
}

/// `ChangePassword(user, new)`: writes the new hash, clears the
/// must-change flag, and bulk-revokes every session for that user.
pub async fn change_password(
    pool: &PgPool,
    user_id: Uuid,
    new_password: &str,
    request_id: &str,
) -> Result<(), AppError> {
    let hash = password::hash_password(new_password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hash failed: {e}")))?;

    sqlx::query(
        "UPDATE users SET password_hash = $2, must_change_password = false WHERE id = $1",
    )
    .bind(user_id)
    .bind(hash)
    .execute(pool)
    .await?;

    session::revoke_all_for_user(pool, user_id, "password_changed", request_id).await?;
    Ok(())
}
