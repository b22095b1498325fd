//! Worker portal tokens (spec.md §4.2 "worker signed token"). A worker
//! token is a short-lived JWT scoped to one `(org_id, user_id, team_id)`
//! triple; it never carries a `Role` because workers don't hold a
//! membership role — their authorization is the ad-hoc team-assignment
//! check in `photos::authorize_download`, not the RBAC table.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

const TOKEN_KIND: &str = "worker";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkerClaims {
    kind: String,
    org_id: Uuid,
    user_id: Uuid,
    team_id: Uuid,
    exp: i64,
    iat: i64,
}

pub struct WorkerPrincipal {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub team_id: Uuid,
}

pub fn mint(secret: &str, org_id: Uuid, user_id: Uuid, team_id: Uuid, ttl_hours: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = WorkerClaims {
        kind: TOKEN_KIND.to_string(),
        org_id,
        user_id,
        team_id,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("worker token encode failed: {e}")))
}

/// Verify and decode a worker token. The `kind` claim guards against a
/// client magic-link or access token being replayed here even though both
/// are signed with the same process secret.
pub fn verify(secret: &str, token: &str) -> Option<WorkerPrincipal> {
    let data = decode::<WorkerClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default()).ok()?;
    if data.claims.kind != TOKEN_KIND {
        return None;
    }
    Some(WorkerPrincipal { org_id: data.claims.org_id, user_id: data.claims.user_id, team_id: data.claims.team_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_and_verifies_roundtrip() {
        let secret = "s";
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        let team = Uuid::new_v4();
        let token = mint(secret, org, user, team, 12).unwrap();
        let principal = verify(secret, &token).unwrap();
        assert_eq!(principal.org_id, org);
        assert_eq!(principal.team_id, team);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint("a", Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 12).unwrap();
        assert!(verify("b", &token).is_none());
    }
}
