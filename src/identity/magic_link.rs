//! Client portal magic links (spec.md §4.2 "customer magic link"). A magic
//! link token is scoped to exactly one `(org_id, booking_id)` pair — it
//! authenticates "the person holding this link may act on this booking",
//! not a user account.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

const TOKEN_KIND: &str = "client_magic_link";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MagicLinkClaims {
    kind: String,
    org_id: Uuid,
    booking_id: Uuid,
    exp: i64,
    iat: i64,
}

pub struct MagicLinkPrincipal {
    pub org_id: Uuid,
    pub booking_id: Uuid,
}

pub fn mint(secret: &str, org_id: Uuid, booking_id: Uuid, ttl_days: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = MagicLinkClaims {
        kind: TOKEN_KIND.to_string(),
        org_id,
        booking_id,
        iat: now.timestamp(),
        exp: (now + Duration::days(ttl_days)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("magic link encode failed: {e}")))
}

pub fn verify(secret: &str, token: &str) -> Option<MagicLinkPrincipal> {
    let data = decode::<MagicLinkClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default()).ok()?;
    if data.claims.kind != TOKEN_KIND {
        return None;
    }
    Some(MagicLinkPrincipal { org_id: data.claims.org_id, booking_id: data.claims.booking_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_and_verifies_roundtrip() {
        let secret = "s";
        let org = Uuid::new_v4();
        let booking = Uuid::new_v4();
        let token = mint(secret, org, booking, 30).unwrap();
        let principal = verify(secret, &token).unwrap();
        assert_eq!(principal.org_id, org);
        assert_eq!(principal.booking_id, booking);
    }

    #[test]
    fn worker_token_cannot_be_used_as_a_magic_link() {
        let secret = "s";
        let worker_token = crate::identity::worker_token::mint(secret, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 1).unwrap();
        assert!(verify(secret, &worker_token).is_none());
    }
}
