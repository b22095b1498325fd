//! Worker portal (spec.md §6): a worker-token principal can see the one
//! booking its team is assigned to and attach photos to it.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
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

fn require_worker_team(tenant: &TenantContext) -> Result<Uuid, AppError> {
    tenant.scoped_team_id.ok_or_else(|| AppError::forbidden("worker token is not scoped to a team"))
}

async fn booking_belongs_to_team(txn: &mut sqlx::Transaction<'_, sqlx::Postgres>, org_id: Uuid, booking_id: Uuid, team_id: Uuid) -> Result<bool, AppError> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM bookings WHERE id = $1 AND org_id = $2 AND team_id = $3)")
        .bind(booking_id)
        .bind(org_id)
        .bind(team_id)
        .fetch_one(&mut **txn)
        .await?;
    Ok(row.0)
}

pub async fn get_booking(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<axum::Json<serde_json::Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let team_id = require_worker_team(&tenant).map_err(|e| err(request_id.clone(), e))?;

    let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await.map_err(|e| err(request_id.clone(), e))?;
    if !booking_belongs_to_team(&mut txn, tenant.org_id, booking_id, team_id).await.map_err(|e| err(request_id.clone(), e))? {
        return Err(err(request_id, AppError::forbidden("worker's team is not assigned to this booking")));
    }

    let booking = crate::booking::get(&mut txn, tenant.org_id, booking_id).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({
        "id": booking.id,
        "status": booking.status,
        "starts_at": booking.starts_at,
        "duration_min": booking.duration_min,
    })))
}

/// `POST /v1/worker/bookings/{id}/photos`. No multipart parsing in this
/// stack — the photo bytes are the raw request body and the MIME type
/// comes from the standard `Content-Type` header, matching how
/// `photos::upload` validates it.
pub async fn upload_photo(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
    bytes: axum::body::Bytes,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let team_id = require_worker_team(&tenant).map_err(|e| err(request_id.clone(), e))?;

    let mime = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| err(request_id.clone(), AppError::validation("missing content-type header")))?
        .to_string();

    let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await.map_err(|e| err(request_id.clone(), e))?;
    if !booking_belongs_to_team(&mut txn, tenant.org_id, booking_id, team_id).await.map_err(|e| err(request_id.clone(), e))? {
        return Err(err(request_id, AppError::forbidden("worker's team is not assigned to this booking")));
    }

    let photo = photos::upload(
        &mut txn,
        &ctx.store,
        tenant.org_id,
        booking_id,
        tenant.user_id,
        &mime,
        bytes.to_vec(),
        ctx.config.photo_max_bytes,
    )
    .await
    .map_err(|e| err(request_id.clone(), e))?;
    txn.commit().await.map_err(|e| err(request_id, AppError::from(e)))?;

    Ok((axum::http::StatusCode::CREATED, Json(json!({ "id": photo.id, "mime": photo.mime, "size_bytes": photo.size_bytes }))).into_response())
}
