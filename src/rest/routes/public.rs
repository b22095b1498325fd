//! Anonymous / public surface (spec.md §6): estimate, chat, lead intake,
//! slot availability, booking creation, the payment webhook, public invoice
//! links, and the local-storage download proxy. None of these require a
//! `TenantContext` — callers identify the org explicitly (`org_id` in the
//! body, defaulting to [`DEFAULT_ORG_ID`] for single-tenant deployments, the
//! same Open-Question resolution `config::DEFAULT_ORG_ID` documents).

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::booking::{self, slot, NewBooking};
use crate::config::DEFAULT_ORG_ID;
use crate::db;
use crate::error::AppError;
use crate::http::error::AppErrorResponse;
use crate::invoice;
use crate::leads::{self, NewLead};
use crate::policy::{enforce_booking_quota, plan_for_org};
use crate::rest::extract;
use crate::storage::local as local_storage;
use crate::{chat, pricing, AppContext};

fn err(request_id: String, error: AppError) -> AppErrorResponse {
    AppErrorResponse { request_id, error }
}

pub async fn estimate(State(ctx): State<AppContext>, headers: HeaderMap, Json(body): Json<Value>) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let config = ctx.pricing_config.get().await;
    let result = pricing::estimate(&body, &config).map_err(|e| err(request_id, e))?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ChatTurnRequest {
    message: String,
    #[serde(default)]
    state: Value,
}

pub async fn chat_turn(Json(body): Json<ChatTurnRequest>) -> Json<Value> {
    Json(chat::advance(&body.message, &body.state))
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    org_id: Option<Uuid>,
    contact_name: String,
    contact_phone: String,
    contact_email: Option<String>,
    contact_address: Option<String>,
    estimate_snapshot: Value,
    referred_by_code: Option<String>,
}

pub async fn create_lead(State(ctx): State<AppContext>, headers: HeaderMap, Json(body): Json<CreateLeadRequest>) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let org_id = body.org_id.unwrap_or(DEFAULT_ORG_ID);

    let mut txn = db::begin_tenant_txn(&ctx.pool, org_id).await.map_err(|e| err(request_id.clone(), e))?;
    let lead = leads::intake(
        &mut txn,
        org_id,
        NewLead {
            contact_name: body.contact_name,
            contact_phone: body.contact_phone,
            contact_email: body.contact_email,
            contact_address: body.contact_address,
            estimate_snapshot: body.estimate_snapshot,
            referred_by_code: body.referred_by_code,
        },
    )
    .await
    .map_err(|e| err(request_id.clone(), e))?;
    txn.commit().await.map_err(|e| err(request_id, AppError::from(e)))?;

    let body = json!({
        "id": lead.id,
        "referral_code": lead.referral_code,
        "status": lead.status,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListSlotsQuery {
    org_id: Option<Uuid>,
    team_id: Uuid,
    date: NaiveDate,
    #[serde(default = "default_duration_min")]
    duration_min: i32,
}

fn default_duration_min() -> i32 {
    120
}

const BUSINESS_OPEN_HOUR: u32 = 9;
const BUSINESS_CLOSE_HOUR: u32 = 17;
const SLOT_STEP_MINUTES: i64 = 30;

/// Generate candidate half-hour start times between `BUSINESS_OPEN_HOUR` and
/// `BUSINESS_CLOSE_HOUR` on `date` and filter out anything that overlaps an
/// existing booking on `team_id`, using the same [`slot::overlaps`] check
/// `booking::create` enforces — so a slot only appears here if it would
/// actually be accepted by `POST /v1/bookings`.
pub async fn list_slots(State(ctx): State<AppContext>, headers: HeaderMap, Query(params): Query<ListSlotsQuery>) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let org_id = params.org_id.unwrap_or(DEFAULT_ORG_ID);

    let day_start = params
        .date
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
        .ok_or_else(|| err(request_id.clone(), AppError::validation("invalid date")))?;

    let mut txn = db::begin_tenant_txn(&ctx.pool, org_id).await.map_err(|e| err(request_id.clone(), e))?;

    let mut available = Vec::new();
    let mut minutes_since_midnight = (BUSINESS_OPEN_HOUR * 60) as i64;
    let close_minutes = (BUSINESS_CLOSE_HOUR * 60) as i64;
    while minutes_since_midnight + params.duration_min as i64 <= close_minutes {
        let starts_at = day_start + ChronoDuration::minutes(minutes_since_midnight);
        let overlap = slot::overlaps(&mut txn, org_id, params.team_id, starts_at, params.duration_min, None)
            .await
            .map_err(|e| err(request_id.clone(), e))?;
        if !overlap {
            available.push(starts_at.to_rfc3339());
        }
        minutes_since_midnight += SLOT_STEP_MINUTES;
    }

    Ok(Json(json!({ "team_id": params.team_id, "date": params.date, "slots": available })))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    org_id: Option<Uuid>,
    lead_id: Option<Uuid>,
    team_id: Uuid,
    starts_at: chrono::DateTime<Utc>,
    duration_min: i32,
}

pub async fn create_booking(State(ctx): State<AppContext>, headers: HeaderMap, Json(body): Json<CreateBookingRequest>) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let org_id = body.org_id.unwrap_or(DEFAULT_ORG_ID);

    let plan = plan_for_org(&ctx.pool, org_id).await.map_err(|e| err(request_id.clone(), e))?;
    enforce_booking_quota(&ctx.pool, org_id, plan).await.map_err(|e| err(request_id.clone(), e))?;

    let mut txn = db::begin_tenant_txn(&ctx.pool, org_id).await.map_err(|e| err(request_id.clone(), e))?;
    let booking = booking::create(
        &mut txn,
        NewBooking { org_id, lead_id: body.lead_id, team_id: body.team_id, starts_at: body.starts_at, duration_min: body.duration_min },
        &request_id,
    )
    .await
    .map_err(|e| err(request_id.clone(), e))?;
    txn.commit().await.map_err(|e| err(request_id, AppError::from(e)))?;

    let body = json!({
        "id": booking.id,
        "status": booking.status,
        "deposit_required": booking.deposit_required,
        "starts_at": booking.starts_at,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    id: String,
    org_id: Uuid,
    booking_id: Uuid,
}

/// `POST /v1/stripe/webhook`. Always answers 2xx for an event it recorded
/// (spec.md §7) — only a bad signature is rejected outright.
pub async fn stripe_webhook(State(ctx): State<AppContext>, headers: HeaderMap, body: Bytes) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| err(request_id.clone(), AppError::IntegrationRejected("missing stripe-signature header".into())))?;
    let webhook_secret = ctx
        .config
        .payment_webhook_secret
        .as_deref()
        .ok_or_else(|| err(request_id.clone(), AppError::DependencyUnavailable("payment_webhook_secret is not configured".into())))?;

    if !booking::webhook::verify_signature(&body, signature, webhook_secret) {
        return Err(err(request_id, AppError::IntegrationRejected("signature verification failed".into())));
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(_) => return Ok((StatusCode::OK, Json(json!({ "received": true, "outcome": "ignored" }))).into_response()),
    };

    if event.event_type != "checkout.session.completed" {
        return Ok((StatusCode::OK, Json(json!({ "received": true, "outcome": "ignored" }))).into_response());
    }

    let outcome = booking::webhook::process_paid_event(&ctx.pool, event.org_id, event.booking_id, &event.id, &request_id)
        .await
        .map_err(|e| err(request_id, e))?;

    let label = match outcome {
        booking::webhook::WebhookResult::Applied(status) => format!("applied:{status}"),
        booking::webhook::WebhookResult::AlreadyProcessed => "already_processed".to_string(),
        booking::webhook::WebhookResult::ReplayMismatch => "replay_mismatch".to_string(),
    };
    Ok((StatusCode::OK, Json(json!({ "received": true, "outcome": label }))).into_response())
}

pub async fn get_invoice_by_token(State(ctx): State<AppContext>, headers: HeaderMap, Path(token): Path<String>) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let invoice = invoice::get_by_public_token(&ctx.pool, &token).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({
        "id": invoice.id,
        "number": invoice.number,
        "status": invoice.status,
        "booking_id": invoice.booking_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StorageDownloadQuery {
    exp: i64,
    sig: String,
}

/// `GET /storage/{key}` — the proxy path the local storage backend's
/// `sign_download` URLs point at. Only wired up when `storage_backend =
/// "local"`; the S3/CDN backends hand out URLs elsewhere entirely.
pub async fn serve_local_storage(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(params): Query<StorageDownloadQuery>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    if ctx.config.storage_backend != "local" {
        return Err(err(request_id, AppError::not_found("storage_object")));
    }

    if !local_storage::verify_signature(&ctx.config.auth_secret, &key, params.exp, &params.sig) {
        return Err(err(request_id, AppError::forbidden("invalid or expired download signature")));
    }

    let path = ctx.config.storage_local_root.join(&key);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| err(request_id, AppError::not_found("storage_object")))?;

    Ok(([(axum::http::header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}
