//! Referral code generation (spec.md §4.9): 8-character, case-normalized,
//! unique per org. Collisions are handled by retrying generation rather
//! than by widening the alphabet — at 8 chars over a 32-symbol alphabet
//! the collision rate within one org is negligible, and the caller already
//! holds a DB round-trip budget for the retry.

use rand::Rng;

/// Crockford-ish alphabet with ambiguous characters (0/O, 1/I/L) removed so
/// a code read aloud to a dispatcher cannot be misheard.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTVWXYZ";

pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..8).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

/// Codes are compared case-normalized; this is the single normalization
/// point both generation and lookup go through.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_eight_chars_from_alphabet() {
        let code = generate();
        assert_eq!(code.len(), 8);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize(" ab3dEfgh "), "AB3DEFGH");
    }
}
