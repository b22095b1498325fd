//! PII and secret redaction for audit records and structured logs.
//!
//! Every audit event and log line that might carry customer data is passed
//! through [`redact_str`] before it leaves the process. The pattern registry
//! covers both credential material (API keys, bearer tokens, PEM blocks) and
//! the PII categories spec'd for this system: emails, phone numbers,
//! addresses, `Authorization` headers, and signed-URL query tokens.

use once_cell::sync::Lazy;
use regex::Regex;

/// Compiled regular expressions for known secret and PII formats.
static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // API keys / tokens
        Regex::new(r"sk-[A-Za-z0-9\-_]{20,}").expect("regex: sk- key"),
        Regex::new(r"ghp_[A-Za-z0-9]{36}").expect("regex: ghp token"),
        Regex::new(r"github_pat_[A-Za-z0-9_]{82}").expect("regex: github pat"),
        Regex::new(r"AKIA[0-9A-Z]{16}").expect("regex: aws key"),
        Regex::new(r#"(?i)(password|secret|token|api_key|auth|private_key)\s*[:=]\s*["']?[A-Za-z0-9+/\-_]{8,}"#)
            .expect("regex: key=value"),
        Regex::new(r"-----BEGIN\s+(?:RSA |EC |OPENSSH )?PRIVATE KEY-----")
            .expect("regex: pem header"),
        Regex::new(r"(?i)authorization\s*:\s*(bearer|basic)\s+[A-Za-z0-9+/\-_.=]{8,}")
            .expect("regex: authorization header"),
        Regex::new(r"(?i)bearer\s+[A-Za-z0-9+/\-_=]{20,}").expect("regex: bearer token"),
        // Signed-URL query tokens: `?sig=...`, `&exp=...&sig=...`, `X-Amz-Signature=...`
        Regex::new(r"(?i)([?&](sig|signature|x-amz-signature|token)=)[^&\s]+")
            .expect("regex: signed url token"),
        // Email addresses
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}")
            .expect("regex: email"),
        // Phone numbers (loose: 7-15 digits, optional separators/country code)
        Regex::new(r"(?:\+?\d{1,3}[\s.\-]?)?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4}\b")
            .expect("regex: phone"),
        // Street addresses: "123 Main St", "4500 Oak Avenue Apt 2"
        Regex::new(r"(?i)\b\d{1,6}\s+([A-Za-z0-9.'\-]+\s){1,4}(street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|way|place|pl)\b")
            .expect("regex: street address"),
    ]
});

/// Redact secrets and PII from a string.
///
/// Returns `(redacted_string, was_redacted)`. If nothing matched, the
/// original string is returned unchanged (no allocation beyond the clone).
pub fn redact_str(input: &str) -> (String, bool) {
    let mut result = input.to_string();
    let mut changed = false;

    for pat in REDACT_PATTERNS.iter() {
        if pat.is_match(&result) {
            result = pat.replace_all(&result, "[REDACTED]").to_string();
            changed = true;
        }
    }

    // High-entropy substrings of 20+ chars are treated as opaque secrets.
    let words: Vec<&str> = result.split_whitespace().collect();
    let mut rebuilt = result.clone();
    for word in &words {
        let token = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '+' && c != '/');
        if token.len() >= 20 && is_high_entropy(token) {
            rebuilt = rebuilt.replace(token, "[REDACTED]");
            changed = true;
        }
    }
    result = rebuilt;

    (result, changed)
}

/// Detect high-entropy strings (Shannon entropy > 4.5 bits/char).
///
/// Random tokens (API keys, base64 secrets) have high entropy; natural
/// language text does not.
pub fn is_high_entropy(s: &str) -> bool {
    if s.len() < 20 {
        return false;
    }
    let mut freq = [0u32; 256];
    let len = s.len() as f64;
    for b in s.bytes() {
        freq[b as usize] += 1;
    }
    let entropy: f64 = freq
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum();
    entropy > 4.5
}

/// Redact every string value of a `serde_json::Value` tree in place.
/// Used to sanitize audit payloads and config snapshots before they are
/// logged or returned over the wire.
pub fn redact_json(value: &mut serde_json::Value) -> bool {
    let mut any = false;
    match value {
        serde_json::Value::String(s) => {
            let (cleaned, changed) = redact_str(s);
            if changed {
                *s = cleaned;
                any = true;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                any |= redact_json(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                any |= redact_json(v);
            }
        }
        _ => {}
    }
    any
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_openai_style_key() {
        let input = "sk-abcdefghijklmnopqrstuvwxyz123456";
        let (out, changed) = redact_str(input);
        assert!(changed);
        assert!(!out.contains("sk-abc"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn redacts_email() {
        let (out, changed) = redact_str("contact jane.doe@example.com for details");
        assert!(changed);
        assert!(!out.contains("jane.doe@example.com"));
    }

    #[test]
    fn redacts_phone_number() {
        let (out, changed) = redact_str("call us at 555-123-4567");
        assert!(changed);
        assert!(!out.contains("555-123-4567"));
    }

    #[test]
    fn redacts_signed_url_token() {
        let (out, changed) =
            redact_str("https://cdn.example.com/orders/x/y.jpg?exp=123&sig=abcdef0123456789");
        assert!(changed);
        assert!(!out.contains("abcdef0123456789"));
        assert!(out.contains("exp=123"));
    }

    #[test]
    fn leaves_clean_string_unchanged() {
        let input = "booking confirmed for team alpha";
        let (out, changed) = redact_str(input);
        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn redact_json_descends_nested_values() {
        let mut v = serde_json::json!({
            "contact": {"email": "a@b.com", "note": "fine"},
            "tags": ["plain", "call 212-555-0100"],
        });
        let changed = redact_json(&mut v);
        assert!(changed);
        assert_eq!(v["contact"]["email"], "[REDACTED]");
        assert_eq!(v["contact"]["note"], "fine");
    }
}
