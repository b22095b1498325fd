//! Password hashing: a current scheme (argon2id) and a legacy scheme
//! (pbkdf2-hmac-sha256) kept only for verifying existing hashes. A
//! successful legacy verification rehashes on the fly so the legacy scheme
//! drains out of the user table over time without a bulk migration.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pbkdf2::password_hash::PasswordHash as LegacyHash;
use pbkdf2::Pbkdf2;
use rand::rngs::OsRng;

/// Hash scheme prefix stored alongside the hash so `verify` knows which
/// verifier to use without re-parsing PHC params by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Argon2,
    LegacyPbkdf2,
}

pub struct VerifyOutcome {
    pub matches: bool,
    /// `Some(new_hash)` when the password matched under the legacy scheme
    /// and should be rehashed under the current scheme.
    pub rehash: Option<String>,
}

/// Hash a new password with the current scheme (argon2id).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn scheme_of(hash: &str) -> Scheme {
    if hash.starts_with("$argon2") {
        Scheme::Argon2
    } else {
        Scheme::LegacyPbkdf2
    }
}

/// Verify `password` against `stored_hash`, transparently supporting the
/// legacy pbkdf2 scheme. Never reveals which scheme failed — callers only
/// see `matches` and an optional rehash to persist.
pub fn verify_password(password: &str, stored_hash: &str) -> VerifyOutcome {
    match scheme_of(stored_hash) {
        Scheme::Argon2 => {
            let matches = PasswordHash::new(stored_hash)
                .ok()
                .map(|parsed| {
                    Argon2::default()
                        .verify_password(password.as_bytes(), &parsed)
                        .is_ok()
                })
                .unwrap_or(false);
            VerifyOutcome { matches, rehash: None }
        }
        Scheme::LegacyPbkdf2 => {
            let matches = LegacyHash::new(stored_hash)
                .ok()
                .map(|parsed| Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
                .unwrap_or(false);
            let rehash = if matches {
                hash_password(password).ok()
            } else {
                None
            };
            VerifyOutcome { matches, rehash }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_current_scheme() {
        let hash = hash_password("correct horse battery staple").unwrap();
        let outcome = verify_password("correct horse battery staple", &hash);
        assert!(outcome.matches);
        assert!(outcome.rehash.is_none());
    }

    #[test]
    fn rejects_wrong_password() {
        let hash = hash_password("right-password").unwrap();
        let outcome = verify_password("wrong-password", &hash);
        assert!(!outcome.matches);
    }

    #[test]
    fn distinct_hashes_for_same_password() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b, "salts must differ");
    }
}
