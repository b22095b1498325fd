//! Session lifecycle (spec.md §4.1): a session row backs one refresh token.
//! Rotation is atomic — the predicated `UPDATE ... WHERE status = 'active'`
//! below guarantees that of two concurrent `rotate` calls racing on the same
//! session, only one observes `rows_affected() == 1` and mints a successor.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::tokens::{generate_opaque_token, hash_opaque_token};
use crate::policy::Role;
use crate::telemetry::audit::{self, AuditEvent};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub refresh_token_hash: String,
    pub status: String,
    pub revoked_reason: Option<String>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct SessionPair {
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

/// Issue a brand-new session (login). Caller has already verified the
/// password and resolved `(org_id, user_id, role)`.
pub async fn issue(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    user_id: Uuid,
    role: Role,
    auth_secret: &str,
    access_ttl_mins: i64,
    refresh_ttl_days: i64,
    request_id: &str,
) -> Result<SessionPair, AppError> {
    let (refresh_token, refresh_hash) = generate_opaque_token();
    let session_id = Uuid::new_v4();
    let refresh_expires_at = Utc::now() + Duration::days(refresh_ttl_days);

    sqlx::query(
        "INSERT INTO sessions (id, org_id, user_id, role, refresh_token_hash, status, refresh_expires_at, created_at)
         VALUES ($1, $2, $3, $4, $5, 'active', $6, now())",
    )
    .bind(session_id)
    .bind(org_id)
    .bind(user_id)
    .bind(role)
    .bind(&refresh_hash)
    .bind(refresh_expires_at)
    .execute(&mut **txn)
    .await?;

    let access_token = crate::identity::tokens::mint_access_token(
        auth_secret,
        user_id,
        org_id,
        role,
        session_id,
        access_ttl_mins,
    )?;

    audit::emit(AuditEvent::new(
        request_id,
        Some(org_id),
        user_id.to_string(),
        "session.issued",
        serde_json::json!({ "session_id": session_id }),
    ));

    Ok(SessionPair {
        session_id,
        access_token,
        refresh_token,
    })
}

/// Rotate a refresh token: look up by hash, reject if revoked or expired,
/// mark the predecessor `revoked` with reason `rotated`, and issue a fresh
/// session pair. The predicated update makes concurrent rotation attempts
/// converge on a single winner.
pub async fn rotate(
    pool: &PgPool,
    refresh_token: &str,
    auth_secret: &str,
    access_ttl_mins: i64,
    refresh_ttl_days: i64,
    request_id: &str,
) -> Result<SessionPair, AppError> {
    let hash = hash_opaque_token(refresh_token);
    let mut txn = pool.begin().await?;

    let session: Option<Session> = sqlx::query_as(
        "SELECT id, org_id, user_id, role, refresh_token_hash, status, revoked_reason, refresh_expires_at, created_at
         FROM sessions WHERE refresh_token_hash = $1",
    )
    .bind(&hash)
    .fetch_optional(&mut *txn)
    .await?;

    let session = session.ok_or(AppError::Unauthenticated)?;
    if session.status != "active" || session.refresh_expires_at <= Utc::now() {
        return Err(AppError::Unauthenticated);
    }

    let result = sqlx::query(
        "UPDATE sessions SET status = 'revoked', revoked_reason = 'rotated'
         WHERE id = $1 AND status = 'active'",
    )
    .bind(session.id)
    .execute(&mut *txn)
    .await?;

    if result.rows_affected() != 1 {
        // Another concurrent rotation already won this race.
        return Err(AppError::Unauthenticated);
    }

    let pair = issue(
        &mut txn,
        session.org_id,
        session.user_id,
        session.role,
        auth_secret,
        access_ttl_mins,
        refresh_ttl_days,
        request_id,
    )
    .await?;

    txn.commit().await?;

    audit::emit(AuditEvent::new(
        request_id,
        Some(session.org_id),
        session.user_id.to_string(),
        "session.refreshed",
        serde_json::json!({ "predecessor": session.id, "successor": pair.session_id }),
    ));

    Ok(pair)
}

/// Revoke a single session by id. Returns the number of rows revoked (0 or 1).
pub async fn revoke_one(pool: &PgPool, session_id: Uuid, reason: &str) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE sessions SET status = 'revoked', revoked_reason = $2
         WHERE id = $1 AND status = 'active'",
    )
    .bind(session_id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Bulk-revoke every active session for a user (password change, admin reset).
pub async fn revoke_all_for_user(
    pool: &PgPool,
    user_id: Uuid,
    reason: &str,
    request_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE sessions SET status = 'revoked', revoked_reason = $2
         WHERE user_id = $1 AND status = 'active'",
    )
    .bind(user_id)
    .bind(reason)
    .execute(pool)
    .await?;

    let revoked = result.rows_affected();
    audit::emit(AuditEvent::new(
        request_id,
        None,
        user_id.to_string(),
        "session.bulk_revoked",
        serde_json::json!({ "reason": reason, "count": revoked }),
    ));
    Ok(revoked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_pair_carries_both_tokens() {
        let pair = SessionPair {
            session_id: Uuid::new_v4(),
            access_token: "a".to_string(),
            refresh_token: "b".to_string(),
        };
        assert_ne!(pair.access_token, pair.refresh_token);
    }
}
