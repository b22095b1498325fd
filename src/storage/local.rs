//! Local-filesystem backend: files live under a configured root; downloads
//! are served through an HMAC-signed proxy URL rather than a raw file path,
//! so the TTL and key binding are enforced the same way as the cloud
//! backends (spec.md §4.4).

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

use super::{ObjectStore, StoredObject};

type HmacSha256 = Hmac<Sha256>;

pub struct LocalStore {
    root: PathBuf,
    signing_key: String,
    public_base_url: String,
}

impl LocalStore {
    pub fn new(root: PathBuf, signing_key: String, public_base_url: String) -> Self {
        Self { root, signing_key, public_base_url }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sign(&self, key: &str, expires_at: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(format!("{key}:{expires_at}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, mime: &str) -> Result<StoredObject, AppError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::DependencyUnavailable(format!("storage write failed: {e}")))?;
        }
        let size_bytes = bytes.len() as u64;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("storage write failed: {e}")))?;
        Ok(StoredObject { key: key.to_string(), size_bytes, mime: mime.to_string() })
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::DependencyUnavailable(format!("storage delete failed: {e}"))),
        }
    }

    async fn sign_download(&self, key: &str, ttl_secs: u64) -> Result<String, AppError> {
        let expires_at = Utc::now().timestamp() + ttl_secs as i64;
        let sig = self.sign(key, expires_at);
        Ok(format!(
            "{}/storage/{key}?exp={expires_at}&sig={sig}",
            self.public_base_url.trim_end_matches('/')
        ))
    }

    async fn sign_upload(&self, key: &str, ttl_secs: u64) -> Result<Option<String>, AppError> {
        // The local backend proxies uploads through this server; there is
        // no direct-to-storage PUT URL to hand out.
        let _ = (key, ttl_secs);
        Ok(None)
    }
}

/// Verify a proxy-served download signature. Used by the HTTP handler that
/// serves `GET /storage/{key}`.
pub fn verify_signature(signing_key: &str, key: &str, expires_at: i64, sig: &str) -> bool {
    if expires_at < Utc::now().timestamp() {
        return false;
    }
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{key}:{expires_at}").as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(expected.as_bytes(), sig.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrips() {
        let store = LocalStore::new(PathBuf::from("/tmp"), "secret".to_string(), "http://local".to_string());
        let future = Utc::now().timestamp() + 60;
        let sig = store.sign("orders/a/b/c.jpg", future);
        assert!(verify_signature("secret", "orders/a/b/c.jpg", future, &sig));
    }

    #[test]
    fn signature_rejects_tampered_key() {
        let store = LocalStore::new(PathBuf::from("/tmp"), "secret".to_string(), "http://local".to_string());
        let future = Utc::now().timestamp() + 60;
        let sig = store.sign("orders/a/b/c.jpg", future);
        assert!(!verify_signature("secret", "orders/a/b/d.jpg", future, &sig));
    }

    #[test]
    fn signature_rejects_expired() {
        let store = LocalStore::new(PathBuf::from("/tmp"), "secret".to_string(), "http://local".to_string());
        let past = Utc::now().timestamp() - 60;
        let sig = store.sign("orders/a/b/c.jpg", past);
        assert!(!verify_signature("secret", "orders/a/b/c.jpg", past, &sig));
    }
}
