//! Client portal (spec.md §6): a magic-link principal can see the one
//! booking it was minted for, list its photos, and fetch download links.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::http::error::AppErrorResponse;
use crate::photos;
use crate::rest::extract;
use crate::tenant::TenantContext;
use crate::AppContext;

fn err(request_id: String, error: AppError) -> AppErrorResponse {
    AppErrorResponse { request_id, error }
}

fn owns_booking(tenant: &TenantContext, booking_id: Uuid) -> bool {
    tenant.scoped_booking_id == Some(booking_id)
}

fn require_ownership(tenant: &TenantContext, booking_id: Uuid) -> Result<(), AppError> {
    if owns_booking(tenant, booking_id) {
        Ok(())
    } else {
        Err(AppError::forbidden("magic link does not own this booking"))
    }
}

pub async fn get_booking(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    require_ownership(&tenant, booking_id).map_err(|e| err(request_id.clone(), e))?;

    let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await.map_err(|e| err(request_id.clone(), e))?;
    let booking = crate::booking::get(&mut txn, tenant.org_id, booking_id).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({
        "id": booking.id,
        "status": booking.status,
        "starts_at": booking.starts_at,
        "duration_min": booking.duration_min,
    })))
}

pub async fn list_photos(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    require_ownership(&tenant, booking_id).map_err(|e| err(request_id.clone(), e))?;

    let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await.map_err(|e| err(request_id.clone(), e))?;
    let photos = photos::list_for_booking(&mut txn, tenant.org_id, booking_id).await.map_err(|e| err(request_id, e))?;

    let body: Vec<_> = photos
        .into_iter()
        .map(|p| json!({ "id": p.id, "mime": p.mime, "size_bytes": p.size_bytes, "created_at": p.created_at }))
        .collect();
    Ok(Json(json!({ "photos": body })))
}

pub async fn download_photo(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Path((booking_id, photo_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let client_owns_booking = owns_booking(&tenant, booking_id);

    let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await.map_err(|e| err(request_id.clone(), e))?;
    let photo = photos::get(&mut txn, tenant.org_id, photo_id).await.map_err(|e| err(request_id.clone(), e))?;
    if photo.booking_id != booking_id {
        return Err(err(request_id, AppError::not_found("photo")));
    }

    photos::authorize_download(&mut txn, &tenant, &photo, client_owns_booking)
        .await
        .map_err(|e| err(request_id.clone(), e))?;

    let url = photos::mint_download_url(&ctx.store, &photo, ctx.config.photo_url_ttl_secs).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "url": url })))
}
