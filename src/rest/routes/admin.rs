//! Admin surface (spec.md §6, §4.14): every handler here runs behind
//! [`admin_guard::enforce`] (Owner/Admin role + IP allowlist + read-only /
//! break-glass) and, for state-changing calls, the admin-idempotency store.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::admin::{self, idempotency};
use crate::booking::{self, Action};
use crate::db;
use crate::error::AppError;
use crate::http::error::AppErrorResponse;
use crate::invoice::{self, NewItem};
use crate::leads::{self, NewLead};
use crate::outbox::{self, dlq, OutboxKind};
use crate::policy::rbac::check_authorized;
use crate::rest::admin_guard;
use crate::rest::extract;
use crate::scheduler::heartbeat;
use crate::tenant::TenantContext;
use crate::{config, retention, AppContext};

fn err(request_id: String, error: AppError) -> AppErrorResponse {
    AppErrorResponse { request_id, error }
}

async fn guard(ctx: &AppContext, tenant: &TenantContext, headers: &HeaderMap, addr: SocketAddr, is_write: bool) -> Result<(), AppError> {
    admin_guard::enforce(ctx, tenant, addr.ip(), headers, is_write).await
}

/// Wrap a write handler body in the admin-idempotency store: replays a
/// stored response for a repeated `(method, path, idempotency-key)` with
/// the same body, rejects it with [`AppError::IdempotencyMismatch`] if the
/// body differs, and stores a fresh result otherwise. Requests with no
/// `Idempotency-Key` header just run straight through, unmemoized.
async fn idempotent<F, Fut>(
    ctx: &AppContext,
    tenant: &TenantContext,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    request_id: &str,
    request_body: &Value,
    run: F,
) -> Result<Response, AppErrorResponse>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(StatusCode, Value), AppError>>,
{
    let Some(key) = extract::idempotency_key(headers) else {
        let (status, body) = run().await.map_err(|e| err(request_id.to_string(), e))?;
        return Ok((status, Json(body)).into_response());
    };

    let hash = idempotency::body_hash(&serde_json::to_vec(request_body).unwrap_or_default());
    match idempotency::check(&ctx.pool, tenant.org_id, method, path, &key, &hash)
        .await
        .map_err(|e| err(request_id.to_string(), e))?
    {
        idempotency::Outcome::Replay { status, body } => {
            let status = StatusCode::from_u16(status as u16).unwrap_or(StatusCode::OK);
            Ok((status, Json(body)).into_response())
        }
        idempotency::Outcome::Fresh => {
            let (status, body) = run().await.map_err(|e| err(request_id.to_string(), e))?;
            idempotency::store(&ctx.pool, tenant.org_id, method, path, &key, &hash, status.as_u16() as i32, &body)
                .await
                .map_err(|e| err(request_id.to_string(), e))?;
            Ok((status, Json(body)).into_response())
        }
    }
}

// --- Leads -----------------------------------------------------------------

pub async fn list_leads(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "lead.read").map_err(|e| err(request_id.clone(), e))?;

    let rows: Vec<leads::Lead> = sqlx::query_as(
        "SELECT id, org_id, contact_name, contact_phone, contact_email, contact_address,
                estimate_snapshot, referral_code, referred_by, status
         FROM leads WHERE org_id = $1 ORDER BY id",
    )
    .bind(tenant.org_id)
    .fetch_all(&ctx.pool)
    .await
    .map_err(|e| err(request_id, AppError::from(e)))?;

    let body: Vec<_> = rows.into_iter().map(|l| json!({ "id": l.id, "contact_name": l.contact_name, "status": l.status, "referral_code": l.referral_code })).collect();
    Ok(Json(json!({ "leads": body })))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateLeadBody {
    contact_name: String,
    contact_phone: String,
    contact_email: Option<String>,
    contact_address: Option<String>,
    estimate_snapshot: Value,
    referred_by_code: Option<String>,
}

pub async fn create_lead(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Json(body): Json<CreateLeadBody>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "lead.write").map_err(|e| err(request_id.clone(), e))?;

    let request_value = serde_json::to_value(&body).unwrap_or(Value::Null);
    idempotent(&ctx, &tenant, &headers, "POST", "/v1/admin/leads", &request_id, &request_value, || async {
        let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await?;
        let lead = leads::intake(
            &mut txn,
            tenant.org_id,
            NewLead {
                contact_name: body.contact_name,
                contact_phone: body.contact_phone,
                contact_email: body.contact_email,
                contact_address: body.contact_address,
                estimate_snapshot: body.estimate_snapshot,
                referred_by_code: body.referred_by_code,
            },
        )
        .await?;
        txn.commit().await?;
        Ok((StatusCode::CREATED, json!({ "id": lead.id, "referral_code": lead.referral_code })))
    })
    .await
}

pub async fn get_lead(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "lead.read").map_err(|e| err(request_id.clone(), e))?;

    let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await.map_err(|e| err(request_id.clone(), e))?;
    let lead = leads::get(&mut txn, tenant.org_id, lead_id).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "id": lead.id, "contact_name": lead.contact_name, "status": lead.status, "referral_code": lead.referral_code })))
}

// --- Bookings ----------------------------------------------------------------

async fn booking_action(
    ctx: &AppContext,
    headers: &HeaderMap,
    addr: SocketAddr,
    tenant: &TenantContext,
    booking_id: Uuid,
    action: Action,
    path: &str,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(headers);
    guard(ctx, tenant, headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "booking.write").map_err(|e| err(request_id.clone(), e))?;

    idempotent(ctx, tenant, headers, "POST", path, &request_id, &json!({ "booking_id": booking_id }), || async {
        let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await?;
        let booking = booking::apply_action(&mut txn, tenant.org_id, booking_id, action, &request_id).await?;
        txn.commit().await?;
        Ok((StatusCode::OK, json!({ "id": booking.id, "status": booking.status })))
    })
    .await
}

/// Admin confirmation override: the FSM has no direct `Pending`/
/// `AwaitingDeposit` → `Confirmed` admin transition, only the
/// [`Action::DepositPaid`] edge the webhook normally drives — so this
/// endpoint is that same transition, invoked manually.
pub async fn confirm_booking(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppErrorResponse> {
    booking_action(&ctx, &headers, addr, &tenant, booking_id, Action::DepositPaid, "/v1/admin/bookings/confirm").await
}

pub async fn cancel_booking(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppErrorResponse> {
    booking_action(&ctx, &headers, addr, &tenant, booking_id, Action::Cancel, "/v1/admin/bookings/cancel").await
}

pub async fn complete_booking(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppErrorResponse> {
    booking_action(&ctx, &headers, addr, &tenant, booking_id, Action::Complete, "/v1/admin/bookings/complete").await
}

pub async fn start_booking(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppErrorResponse> {
    booking_action(&ctx, &headers, addr, &tenant, booking_id, Action::Start, "/v1/admin/bookings/start").await
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RescheduleBody {
    starts_at: DateTime<Utc>,
    duration_min: i32,
}

pub async fn reschedule_booking(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<RescheduleBody>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "booking.write").map_err(|e| err(request_id.clone(), e))?;

    let request_value = serde_json::to_value(&body).unwrap_or(Value::Null);
    idempotent(&ctx, &tenant, &headers, "POST", "/v1/admin/bookings/reschedule", &request_id, &request_value, || async {
        let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await?;
        let booking = booking::reschedule(&mut txn, tenant.org_id, booking_id, body.starts_at, body.duration_min, &request_id).await?;
        txn.commit().await?;
        Ok((StatusCode::OK, json!({ "id": booking.id, "status": booking.status, "starts_at": booking.starts_at })))
    })
    .await
}

// --- Invoices ----------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
pub struct InvoiceItemBody {
    description: String,
    qty: i32,
    unit_price_cents: i64,
    tax_cents: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateInvoiceBody {
    items: Vec<InvoiceItemBody>,
}

pub async fn create_invoice(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<CreateInvoiceBody>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "invoice.write").map_err(|e| err(request_id.clone(), e))?;

    let request_value = serde_json::to_value(&body).unwrap_or(Value::Null);
    idempotent(&ctx, &tenant, &headers, "POST", "/v1/admin/orders/invoice", &request_id, &request_value, || async {
        let items: Vec<NewItem> = body
            .items
            .into_iter()
            .map(|i| NewItem { description: i.description, qty: i.qty, unit_price_cents: i.unit_price_cents, tax_cents: i.tax_cents })
            .collect();
        let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await?;
        let invoice = invoice::create_from_booking(&mut txn, tenant.org_id, booking_id, &items).await?;
        txn.commit().await?;
        Ok((StatusCode::CREATED, json!({ "id": invoice.id, "number": invoice.number, "status": invoice.status })))
    })
    .await
}

pub async fn send_invoice(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "invoice.write").map_err(|e| err(request_id.clone(), e))?;

    idempotent(&ctx, &tenant, &headers, "POST", "/v1/admin/invoices/send", &request_id, &json!({ "invoice_id": invoice_id }), || async {
        let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await?;
        let (invoice, token) = invoice::send(&mut txn, tenant.org_id, invoice_id).await?;
        txn.commit().await?;
        Ok((StatusCode::OK, json!({ "id": invoice.id, "status": invoice.status, "public_token": token })))
    })
    .await
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RecordPaymentBody {
    amount_cents: i64,
}

pub async fn record_payment(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
    Json(body): Json<RecordPaymentBody>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "invoice.write").map_err(|e| err(request_id.clone(), e))?;

    let request_value = serde_json::to_value(&body).unwrap_or(Value::Null);
    idempotent(&ctx, &tenant, &headers, "POST", "/v1/admin/invoices/payments", &request_id, &request_value, || async {
        let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await?;
        let invoice = invoice::record_payment(&mut txn, tenant.org_id, invoice_id, body.amount_cents).await?;
        txn.commit().await?;
        Ok((StatusCode::OK, json!({ "id": invoice.id, "status": invoice.status })))
    })
    .await
}

pub async fn void_invoice(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "invoice.write").map_err(|e| err(request_id.clone(), e))?;

    idempotent(&ctx, &tenant, &headers, "POST", "/v1/admin/invoices/void", &request_id, &json!({ "invoice_id": invoice_id }), || async {
        let mut txn = db::begin_tenant_txn(&ctx.pool, tenant.org_id).await?;
        let invoice = invoice::void(&mut txn, tenant.org_id, invoice_id).await?;
        txn.commit().await?;
        Ok((StatusCode::OK, json!({ "id": invoice.id, "status": invoice.status })))
    })
    .await
}

// --- Outbox / export dead letters -------------------------------------------

pub async fn list_dead_letter(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "outbox.read").map_err(|e| err(request_id.clone(), e))?;

    let items = dlq::list_dead(&ctx.pool, tenant.org_id, 100).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "items": items.into_iter().map(summarize_outbox_item).collect::<Vec<_>>() })))
}

pub async fn list_export_dead_letter(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "outbox.read").map_err(|e| err(request_id.clone(), e))?;

    let items = dlq::list_dead(&ctx.pool, tenant.org_id, 100).await.map_err(|e| err(request_id, e))?;
    let items: Vec<_> = items.into_iter().filter(|i| i.kind == OutboxKind::ExportWebhook).map(summarize_outbox_item).collect();
    Ok(Json(json!({ "items": items })))
}

fn summarize_outbox_item(item: outbox::OutboxItem) -> Value {
    json!({ "id": item.id, "kind": format!("{:?}", item.kind), "attempts": item.attempts, "last_error": item.last_error })
}

pub async fn replay_dead_letter(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "outbox.replay").map_err(|e| err(request_id.clone(), e))?;

    idempotent(&ctx, &tenant, &headers, "POST", "/v1/admin/outbox/dead-letter/replay", &request_id, &json!({ "event_id": event_id }), || async {
        let item = dlq::replay(&ctx.pool, tenant.org_id, event_id).await?;
        Ok((StatusCode::OK, json!({ "id": item.id, "status": item.status })))
    })
    .await
}

// --- Pricing / jobs / feature flags / config --------------------------------

pub async fn reload_pricing(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id, e))?;
    ctx.pricing_config.set(body).await;
    Ok(Json(json!({ "reloaded": true })))
}

pub async fn jobs_status(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;

    let heartbeats = heartbeat::all(&ctx.pool).await.map_err(|e| err(request_id, e))?;
    let body: Vec<_> = heartbeats
        .into_iter()
        .map(|h| json!({ "job_name": h.job_name, "last_beat_at": h.last_beat_at, "last_success_at": h.last_success_at, "consecutive_failures": h.consecutive_failures }))
        .collect();
    Ok(Json(json!({ "jobs": body })))
}

pub async fn get_feature_flags(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id, e))?;
    let flags = ctx.feature_flags.get().await;
    Ok(Json(json!({ "flags": flags.flags })))
}

pub async fn set_feature_flags(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Json(body): Json<config::FeatureFlags>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id, e))?;
    ctx.feature_flags.set(body).await;
    Ok(Json(json!({ "updated": true })))
}

#[derive(Debug, Deserialize)]
pub struct BreakGlassBody {
    reason: String,
    ttl_minutes: i64,
}

pub async fn start_break_glass(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
    Json(body): Json<BreakGlassBody>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;

    let token = admin::gate::issue_break_glass(&ctx.pool, tenant.org_id, tenant.user_id, &body.reason, body.ttl_minutes, &request_id)
        .await
        .map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "token": token })))
}

pub async fn get_config(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "config.read").map_err(|e| err(request_id, e))?;

    let config = ctx.config_handle.current().await;
    Ok(Json(config.redacted_snapshot()))
}

/// Hot-reloads config from the same sources `Config::load` reads at boot
/// (env vars + `cleanco.toml`), preserving the running process's port and
/// log filter rather than letting a reload change either mid-flight.
pub async fn reload_config(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id, e))?;

    let current = ctx.config_handle.current().await;
    let reloaded = config::Config::load(None, Some(current.port), Some(current.log.clone()));
    let snapshot = reloaded.redacted_snapshot();
    ctx.config_handle.reload(reloaded).await;
    Ok(Json(snapshot))
}

/// Read-only visibility over pending/dead email outbox items — not a
/// dispatcher, just the admin-facing view `dlq::list_dead` doesn't cover
/// (non-dead items in flight).
pub async fn email_scan(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, false).await.map_err(|e| err(request_id.clone(), e))?;
    check_authorized(tenant.role, "outbox.read").map_err(|e| err(request_id.clone(), e))?;

    let rows: Vec<outbox::OutboxItem> = sqlx::query_as(
        "SELECT id, org_id, kind, dedupe_key, payload, status, attempts, next_attempt_at,
                leased_by, leased_at, last_error
         FROM outbox_items WHERE org_id = $1 AND kind = 'email' ORDER BY next_attempt_at DESC LIMIT 100",
    )
    .bind(tenant.org_id)
    .fetch_all(&ctx.pool)
    .await
    .map_err(|e| err(request_id, AppError::from(e)))?;

    Ok(Json(json!({ "items": rows.into_iter().map(summarize_outbox_item).collect::<Vec<_>>() })))
}

/// Manually trigger the `retention_cleanup` job's idempotency-table half —
/// the scheduler runs this on its own cadence; this endpoint exists for an
/// operator who doesn't want to wait for the hourly tick.
pub async fn cleanup(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;

    let pruned = idempotency::prune_expired(&ctx.pool, ctx.config.admin_idempotency_ttl_hours).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "idempotency_rows_pruned": pruned })))
}

/// Manually trigger the retention sweeps the `retention_cleanup` and
/// `storage_janitor` jobs otherwise run on a schedule (spec.md §4.11).
pub async fn retention_cleanup(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    tenant: TenantContext,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    guard(&ctx, &tenant, &headers, addr, true).await.map_err(|e| err(request_id.clone(), e))?;

    let leads_erased = retention::sweep_leads(&ctx.pool, ctx.config.retention_days).await.map_err(|e| err(request_id.clone(), e))?;
    let photos_erased = retention::sweep_photos(&ctx.pool, &ctx.store, ctx.config.retention_days, 200).await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "leads_erased": leads_erased, "photos_erased": photos_erased })))
}
