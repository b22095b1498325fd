//! Image-CDN backend: uploads go through the origin (this server, which
//! proxies to the CDN's origin-store API); downloads are signed
//! `exp`/`sig` redirects the CDN edge validates itself. There is no
//! client-direct upload URL, matching spec.md §4.4's "sign_upload → url?".

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

use super::{ObjectStore, StoredObject};

type HmacSha256 = Hmac<Sha256>;

pub struct CdnStore {
    base_url: String,
    signing_key: String,
    http: reqwest::Client,
}

impl CdnStore {
    pub fn new(base_url: String, signing_key: String) -> Self {
        Self {
            base_url,
            signing_key,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client builds with sane defaults"),
        }
    }
}

#[async_trait]
impl ObjectStore for CdnStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, mime: &str) -> Result<StoredObject, AppError> {
        let size_bytes = bytes.len() as u64;
        let resp = self
            .http
            .put(format!("{}/origin/{key}", self.base_url.trim_end_matches('/')))
            .header("content-type", mime)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("cdn origin put failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::DependencyUnavailable(format!(
                "cdn origin put returned {}",
                resp.status()
            )));
        }
        Ok(StoredObject { key: key.to_string(), size_bytes, mime: mime.to_string() })
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let resp = self
            .http
            .delete(format!("{}/origin/{key}", self.base_url.trim_end_matches('/')))
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("cdn origin delete failed: {e}")))?;
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            return Err(AppError::DependencyUnavailable(format!(
                "cdn origin delete returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn sign_download(&self, key: &str, ttl_secs: u64) -> Result<String, AppError> {
        let expires_at = Utc::now().timestamp() + ttl_secs as i64;
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(format!("{key}:{expires_at}").as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        Ok(format!(
            "{}/{key}?exp={expires_at}&sig={sig}",
            self.base_url.trim_end_matches('/')
        ))
    }

    async fn sign_upload(&self, _key: &str, _ttl_secs: u64) -> Result<Option<String>, AppError> {
        Ok(None)
    }
}
