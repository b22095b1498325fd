//! Storage Gateway (spec.md §4.4): a uniform `put`/`delete`/`sign_download`/
//! `sign_upload` contract over local-filesystem, S3-compatible, and
//! image-CDN backends. The gateway never returns a raw bucket URL — every
//! download is a signed, time-limited redirect.

pub mod cdn;
pub mod key;
pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppError;

pub use key::object_key;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: u64,
    pub mime: String,
}

/// Capability contract every storage backend implements. Keeping this as a
/// trait object (`Arc<dyn ObjectStore>`) lets `AppContext` swap backends by
/// config without the rest of the crate knowing which one is live.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, mime: &str) -> Result<StoredObject, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    /// Mint a time-limited download URL. `ttl_secs` is clamped by the
    /// caller to the configured ceiling before reaching the backend.
    async fn sign_download(&self, key: &str, ttl_secs: u64) -> Result<String, AppError>;
    /// Not every backend supports direct client upload (the CDN backend
    /// does not); `None` means "upload through this server instead".
    async fn sign_upload(&self, key: &str, ttl_secs: u64) -> Result<Option<String>, AppError>;
}

/// Build the configured backend from `storage_backend`. Chosen once at
/// process startup rather than looked up per-request, so a misconfigured
/// backend fails fast at boot instead of on the first upload.
pub fn build(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage_backend.as_str() {
        "local" => {
            let public_base_url = config
                .storage_s3_endpoint
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}", config.port));
            Ok(Arc::new(local::LocalStore::new(
                config.storage_local_root.clone(),
                config.auth_secret.clone(),
                public_base_url,
            )))
        }
        "s3" => {
            let bucket = config
                .storage_s3_bucket
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage_backend = s3 requires storage_s3_bucket"))?;
            let endpoint = config
                .storage_s3_endpoint
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage_backend = s3 requires storage_s3_endpoint"))?;
            let access_key = config
                .storage_s3_access_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage_backend = s3 requires storage_s3_access_key"))?;
            let secret_key = config
                .storage_s3_secret_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage_backend = s3 requires storage_s3_secret_key"))?;
            Ok(Arc::new(s3::S3Store::new(bucket, endpoint, access_key, secret_key)))
        }
        "cdn" => {
            let base_url = config
                .storage_cdn_base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage_backend = cdn requires storage_cdn_base_url"))?;
            let signing_key = config
                .storage_cdn_signing_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage_backend = cdn requires storage_cdn_signing_key"))?;
            Ok(Arc::new(cdn::CdnStore::new(base_url, signing_key)))
        }
        other => Err(anyhow::anyhow!("unknown storage_backend: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::key::object_key;

    #[test]
    fn object_key_rejects_traversal() {
        assert!(object_key("org", "booking", "../../etc/passwd", None).is_err());
    }
}
