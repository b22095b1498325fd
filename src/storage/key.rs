//! Object key layout: `orders/{org_id}/{booking_id}/{photo_id}[.ext]`
//! (spec.md §4.4). Every path component is restricted to
//! `[A-Za-z0-9._-]` and traversal sequences are rejected before the key
//! ever reaches a backend.

use crate::error::AppError;

fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

/// Build and validate an object key. `ext`, if present, is appended with a
/// leading dot and validated the same way as the other components.
pub fn object_key(
    org_id: &str,
    booking_id: &str,
    photo_id: &str,
    ext: Option<&str>,
) -> Result<String, AppError> {
    for part in [org_id, booking_id, photo_id] {
        if !is_safe_component(part) {
            return Err(AppError::validation(format!("invalid storage key component: {part}")));
        }
    }
    let mut key = format!("orders/{org_id}/{booking_id}/{photo_id}");
    if let Some(ext) = ext {
        if !is_safe_component(ext) {
            return Err(AppError::validation(format!("invalid storage key extension: {ext}")));
        }
        key.push('.');
        key.push_str(ext);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_well_formed_key() {
        let key = object_key("org1", "bk1", "ph1", Some("jpg")).unwrap();
        assert_eq!(key, "orders/org1/bk1/ph1.jpg");
    }

    #[test]
    fn rejects_traversal_in_any_component() {
        assert!(object_key("../escape", "bk1", "ph1", None).is_err());
        assert!(object_key("org1", "bk1", "ph1", Some("../evil")).is_err());
    }

    #[test]
    fn rejects_path_separators() {
        assert!(object_key("org1", "bk1/evil", "ph1", None).is_err());
    }
}
