//! Public invoice links (spec.md §4.8, §6 `/i/{token}`). The token itself
//! is 48 random bytes, base64url-encoded for the URL; only its SHA-256 hash
//! is ever persisted, mirroring the refresh-token posture in
//! `identity::tokens`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a new public link token and the hash that gets stored. The
/// plaintext token is returned once, for inclusion in the outgoing email —
/// callers must not log or persist it.
pub fn generate() -> (String, String) {
    let mut bytes = [0u8; 48];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_token(&token);
    (token, hash)
}

pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique() {
        let (a, _) = generate();
        let (b, _) = generate();
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_deterministic() {
        let (token, hash) = generate();
        assert_eq!(hash_token(&token), hash);
    }
}
