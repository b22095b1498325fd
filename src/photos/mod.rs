//! Photo & Evidence Service (spec.md §4.10): upload validation, org-scoped
//! key layout on top of the Storage Gateway, and download token vending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::outbox::{self, OutboxKind};
use crate::policy::rbac::check_authorized;
use crate::policy::{enforce_storage_quota, plan_for_org};
use crate::storage::{object_key, ObjectStore};
use crate::tenant::{PrincipalKind, TenantContext};

const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/heic"];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub org_id: Uuid,
    pub booking_id: Uuid,
    pub storage_key: String,
    pub mime: String,
    pub size_bytes: i64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
}

fn validate_upload(mime: &str, size_bytes: u64, max_size_bytes: u64) -> Result<(), AppError> {
    if !ALLOWED_MIME_TYPES.contains(&mime) {
        return Err(AppError::validation(format!("unsupported photo mime type: {mime}")));
    }
    if size_bytes == 0 || size_bytes > max_size_bytes {
        return Err(AppError::validation(format!("photo size {size_bytes} exceeds the {max_size_bytes} byte limit")));
    }
    Ok(())
}

/// Upload: validate before accepting bytes, check the org's `max_storage_bytes`
/// quota (spec.md §4.3), persist the DB row, then write bytes through the
/// Storage Gateway. The DB row is committed with the caller's transaction;
/// if the subsequent `store.put` fails the row still exists pointing at an
/// object that was never written — callers that need stronger guarantees
/// should retry the put, not re-run this function (it would mint a second
/// DB row for the same photo).
#[allow(clippy::too_many_arguments)]
pub async fn upload(
    txn: &mut Transaction<'_, Postgres>,
    store: &Arc<dyn ObjectStore>,
    org_id: Uuid,
    booking_id: Uuid,
    created_by: Uuid,
    mime: &str,
    bytes: Vec<u8>,
    max_size_bytes: u64,
) -> Result<Photo, AppError> {
    validate_upload(mime, bytes.len() as u64, max_size_bytes)?;

    let plan = plan_for_org(&mut **txn, org_id).await?;
    enforce_storage_quota(&mut **txn, org_id, plan, bytes.len() as u64).await?;

    let id = Uuid::new_v4();
    let key = object_key(&org_id.to_string(), &booking_id.to_string(), &id.to_string(), Some(extension_for(mime)))?;
    let size_bytes = bytes.len() as i64;

    sqlx::query(
        "INSERT INTO photos (id, org_id, booking_id, storage_key, mime, size_bytes, created_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
    )
    .bind(id)
    .bind(org_id)
    .bind(booking_id)
    .bind(&key)
    .bind(mime)
    .bind(size_bytes)
    .bind(created_by)
    .execute(&mut **txn)
    .await?;

    store.put(&key, bytes, mime).await?;

    Ok(Photo { id, org_id, booking_id, storage_key: key, mime: mime.to_string(), size_bytes, created_by, created_at: Utc::now() })
}

/// List every photo attached to a booking, oldest first — backs the worker
/// and client portal photo galleries.
pub async fn list_for_booking(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, booking_id: Uuid) -> Result<Vec<Photo>, AppError> {
    let rows: Vec<Photo> = sqlx::query_as(
        "SELECT id, org_id, booking_id, storage_key, mime, size_bytes, created_by, created_at
         FROM photos WHERE org_id = $1 AND booking_id = $2
         ORDER BY created_at ASC",
    )
    .bind(org_id)
    .bind(booking_id)
    .fetch_all(&mut **txn)
    .await?;
    Ok(rows)
}

pub async fn get(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, photo_id: Uuid) -> Result<Photo, AppError> {
    let row: Option<Photo> = sqlx::query_as(
        "SELECT id, org_id, booking_id, storage_key, mime, size_bytes, created_by, created_at
         FROM photos WHERE id = $1 AND org_id = $2",
    )
    .bind(photo_id)
    .bind(org_id)
    .fetch_optional(&mut **txn)
    .await?;
    row.ok_or(AppError::NotFound { resource: "photo" })
}

/// `true` if a worker belongs to the team assigned to `booking_id`.
async fn worker_assigned_to_booking(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, user_id: Uuid, booking_id: Uuid) -> Result<bool, AppError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM bookings b
            JOIN team_members tm ON tm.team_id = b.team_id
            WHERE b.id = $1 AND b.org_id = $2 AND tm.user_id = $3
         )",
    )
    .bind(booking_id)
    .bind(org_id)
    .bind(user_id)
    .fetch_one(&mut **txn)
    .await?;
    Ok(row.0)
}

/// Authorization for the download path (spec.md §4.10): admin, worker of
/// the assigned team, or a magic-link client who owns the booking.
pub async fn authorize_download(
    txn: &mut Transaction<'_, Postgres>,
    ctx: &TenantContext,
    photo: &Photo,
    client_owns_booking: bool,
) -> Result<(), AppError> {
    match ctx.kind {
        PrincipalKind::AdminOperator => Ok(()),
        PrincipalKind::OrgUser { .. } => check_authorized(ctx.role, "photo.read"),
        PrincipalKind::Worker => {
            if worker_assigned_to_booking(txn, ctx.org_id, ctx.user_id, photo.booking_id).await? {
                Ok(())
            } else {
                Err(AppError::forbidden("worker is not assigned to this booking's team"))
            }
        }
        PrincipalKind::Client => {
            if client_owns_booking {
                Ok(())
            } else {
                Err(AppError::forbidden("magic link does not own this booking"))
            }
        }
    }
}

/// Mint a time-limited download URL for an already-authorized caller.
/// `ttl_secs` is `config.photo_url_ttl_secs` — the configured ceiling from
/// spec.md §4.4/§5 (default 60s), not a caller-negotiable value.
pub async fn mint_download_url(store: &Arc<dyn ObjectStore>, photo: &Photo, ttl_secs: u64) -> Result<String, AppError> {
    store.sign_download(&photo.storage_key, ttl_secs).await
}

/// Delete order (spec.md §3, §4.10): remove the DB row first, then enqueue
/// the object delete for the storage-janitor outbox so a crash between the
/// two steps leaves an orphaned object rather than a dangling DB reference.
pub async fn delete(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, photo_id: Uuid) -> Result<(), AppError> {
    let photo = get(txn, org_id, photo_id).await?;

    sqlx::query("DELETE FROM photos WHERE id = $1 AND org_id = $2")
        .bind(photo_id)
        .bind(org_id)
        .execute(&mut **txn)
        .await?;

    let dedupe_key = format!("photo-delete:{photo_id}");
    let payload = serde_json::json!({ "key": photo.storage_key });
    outbox::enqueue(txn, org_id, OutboxKind::StorageDelete, &dedupe_key, payload).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;

    #[test]
    fn rejects_unsupported_mime() {
        assert!(validate_upload("application/pdf", 1024, TEST_MAX_SIZE_BYTES).is_err());
    }

    #[test]
    fn rejects_oversized_upload() {
        assert!(validate_upload("image/jpeg", TEST_MAX_SIZE_BYTES + 1, TEST_MAX_SIZE_BYTES).is_err());
    }

    #[test]
    fn rejects_empty_upload() {
        assert!(validate_upload("image/jpeg", 0, TEST_MAX_SIZE_BYTES).is_err());
    }

    #[test]
    fn accepts_well_formed_upload() {
        assert!(validate_upload("image/png", 2048, TEST_MAX_SIZE_BYTES).is_ok());
    }

    #[test]
    fn extension_matches_known_mime_types() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
    }
}
