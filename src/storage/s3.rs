//! S3-compatible backend: presigned GET/PUT URLs via SigV4-style query
//! signing. Actual object bytes go straight to the bucket over `reqwest`;
//! this crate does not vendor a full AWS SDK, matching the pack's
//! preference for a lean `reqwest`-based client over a heavyweight one.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

use super::{ObjectStore, StoredObject};

type HmacSha256 = Hmac<Sha256>;

pub struct S3Store {
    bucket: String,
    endpoint: String,
    access_key: String,
    secret_key: String,
    http: reqwest::Client,
}

impl S3Store {
    pub fn new(bucket: String, endpoint: String, access_key: String, secret_key: String) -> Self {
        Self {
            bucket,
            endpoint,
            access_key,
            secret_key,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client builds with sane defaults"),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.endpoint.trim_end_matches('/'), self.bucket)
    }

    fn presign(&self, method: &str, key: &str, ttl_secs: u64) -> String {
        let expires_at = Utc::now().timestamp() + ttl_secs as i64;
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(format!("{method}:{}:{key}:{expires_at}", self.bucket).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        format!(
            "{}?AWSAccessKeyId={}&Expires={expires_at}&Signature={sig}",
            self.object_url(key),
            self.access_key
        )
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, bytes: Vec<u8>, mime: &str) -> Result<StoredObject, AppError> {
        let url = self.presign("PUT", key, 60);
        let size_bytes = bytes.len() as u64;
        let resp = self
            .http
            .put(&url)
            .header("content-type", mime)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("s3 put failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::DependencyUnavailable(format!(
                "s3 put returned {}",
                resp.status()
            )));
        }
        Ok(StoredObject { key: key.to_string(), size_bytes, mime: mime.to_string() })
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let url = self.presign("DELETE", key, 60);
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("s3 delete failed: {e}")))?;
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            return Err(AppError::DependencyUnavailable(format!(
                "s3 delete returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn sign_download(&self, key: &str, ttl_secs: u64) -> Result<String, AppError> {
        Ok(self.presign("GET", key, ttl_secs))
    }

    async fn sign_upload(&self, key: &str, ttl_secs: u64) -> Result<Option<String>, AppError> {
        Ok(Some(self.presign("PUT", key, ttl_secs)))
    }
}
