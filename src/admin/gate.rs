//! Admin Safety Gate (spec.md §4.14): optional CIDR allowlist, a read-only
//! toggle that turns writes into `409 Conflict` during incidents, and a
//! break-glass short-TTL token that overrides read-only for emergency
//! writes, scoped to the issuer's org and logged to audit on issue.

use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use ipnetwork::IpNetwork;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::telemetry::audit::{self, AuditEvent};

/// `true` when `allowlist` is empty (no restriction configured) or `addr`
/// matches at least one CIDR entry. A malformed entry in the allowlist is
/// treated as non-matching rather than failing the whole check closed —
/// misconfiguration should not accidentally open the gate to everyone.
pub fn ip_allowed(allowlist: &[String], addr: IpAddr) -> bool {
    if allowlist.is_empty() {
        return true;
    }
    allowlist.iter().filter_map(|entry| IpNetwork::from_str(entry).ok()).any(|net| net.contains(addr))
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issue a break-glass token for `org_id`, valid for `ttl_minutes`. Only
/// the hash is persisted; the plaintext is returned once and must be
/// relayed to the operator out of band. Issuance is always audited.
pub async fn issue_break_glass(
    pool: &PgPool,
    org_id: Uuid,
    issued_by: Uuid,
    reason: &str,
    ttl_minutes: i64,
    request_id: &str,
) -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    let token = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes);
    let hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

    sqlx::query(
        "INSERT INTO admin_break_glass_tokens (id, org_id, issued_by, reason, token_hash, expires_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, now())",
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(issued_by)
    .bind(reason)
    .bind(&hash)
    .bind(expires_at)
    .execute(pool)
    .await?;

    audit::emit(AuditEvent::new(
        request_id,
        Some(org_id),
        issued_by.to_string(),
        "admin.break_glass_issued",
        serde_json::json!({ "reason": reason, "expires_at": expires_at }),
    ));

    Ok(token)
}

/// `true` if `token` is a live, unexpired break-glass token scoped to
/// `org_id`. Override tokens never cross org boundaries.
pub async fn verify_break_glass(pool: &PgPool, org_id: Uuid, token: &str) -> Result<bool, AppError> {
    let hash = hash_token(token);
    let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT expires_at FROM admin_break_glass_tokens WHERE org_id = $1 AND token_hash = $2",
    )
    .bind(org_id)
    .bind(&hash)
    .fetch_optional(pool)
    .await?;

    Ok(matches!(row, Some((expires_at,)) if expires_at > Utc::now()))
}

/// Enforce the read-only toggle: state-changing admin requests are
/// rejected with `409 Conflict` while `admin_read_only` is set, unless a
/// valid break-glass token overrides it.
pub fn enforce_read_only(admin_read_only: bool, is_write: bool, break_glass_override: bool) -> Result<(), AppError> {
    if admin_read_only && is_write && !break_glass_override {
        return Err(AppError::conflict("admin API is in read-only mode"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_allows_everything() {
        assert!(ip_allowed(&[], "203.0.113.1".parse().unwrap()));
    }

    #[test]
    fn matching_cidr_is_allowed() {
        let allowlist = vec!["10.0.0.0/8".to_string()];
        assert!(ip_allowed(&allowlist, "10.1.2.3".parse().unwrap()));
    }

    #[test]
    fn non_matching_address_is_rejected() {
        let allowlist = vec!["10.0.0.0/8".to_string()];
        assert!(!ip_allowed(&allowlist, "203.0.113.1".parse().unwrap()));
    }

    #[test]
    fn malformed_entries_do_not_open_the_gate() {
        let allowlist = vec!["not-a-cidr".to_string()];
        assert!(!ip_allowed(&allowlist, "203.0.113.1".parse().unwrap()));
    }

    #[test]
    fn read_only_blocks_writes_without_override() {
        assert!(enforce_read_only(true, true, false).is_err());
    }

    #[test]
    fn read_only_allows_reads() {
        assert!(enforce_read_only(true, false, false).is_ok());
    }

    #[test]
    fn break_glass_overrides_read_only() {
        assert!(enforce_read_only(true, true, true).is_ok());
    }
}
