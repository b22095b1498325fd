//! Access token minting and verification (JWT, HS256) and refresh-token
//! hashing. Access tokens are short-lived and carry exactly the claim set
//! from spec.md §6: `{sub, org_id, role, sid, jti, exp, iat}`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::policy::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: user id.
    pub sub: Uuid,
    pub org_id: Uuid,
    pub role: Role,
    /// Session id this access token belongs to.
    pub sid: Uuid,
    /// Unique token id, for future per-jti revocation lists.
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

pub fn mint_access_token(
    secret: &str,
    user_id: Uuid,
    org_id: Uuid,
    role: Role,
    session_id: Uuid,
    ttl_mins: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id,
        org_id,
        role,
        sid: session_id,
        jti: Uuid::new_v4(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(ttl_mins)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("jwt encode failed: {e}")))
}

pub fn verify_access_token(secret: &str, token: &str) -> Result<AccessClaims, AppError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated)?;
    Ok(data.claims)
}

/// Generate an opaque refresh token (32 random bytes, base64url) and its
/// SHA-256 hash. Only the hash is ever persisted.
pub fn generate_opaque_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes);
    let hash = hash_opaque_token(&token);
    (token, hash)
}

pub fn hash_opaque_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_and_verifies_roundtrip() {
        let secret = "test-secret";
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let token = mint_access_token(secret, user, org, Role::Admin, sid, 15).unwrap();
        let claims = verify_access_token(secret, &token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.org_id, org);
        assert_eq!(claims.sid, sid);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint_access_token("secret-a", Uuid::new_v4(), Uuid::new_v4(), Role::Viewer, Uuid::new_v4(), 15)
            .unwrap();
        assert!(verify_access_token("secret-b", &token).is_err());
    }

    #[test]
    fn opaque_token_hash_is_deterministic_and_distinct() {
        let (token_a, hash_a) = generate_opaque_token();
        let (token_b, hash_b) = generate_opaque_token();
        assert_ne!(token_a, token_b);
        assert_ne!(hash_a, hash_b);
        assert_eq!(hash_opaque_token(&token_a), hash_a);
    }
}
