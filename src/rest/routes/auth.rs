//! Org-user authentication (spec.md §4.1, §6): login, refresh rotation,
//! logout, the current-principal probe, and forced password changes.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::http::error::AppErrorResponse;
use crate::identity;
use crate::rest::extract;
use crate::tenant::{PrincipalKind, TenantContext};
use crate::AppContext;

fn err(request_id: String, error: AppError) -> AppErrorResponse {
    AppErrorResponse { request_id, error }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    org_id: Uuid,
    email: String,
    password: String,
}

pub async fn login(State(ctx): State<AppContext>, headers: HeaderMap, Json(body): Json<LoginRequest>) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let (pair, must_change_password) = identity::authenticate(
        &ctx.pool,
        body.org_id,
        &body.email,
        &body.password,
        &ctx.config.auth_secret,
        ctx.config.access_ttl_mins,
        ctx.config.refresh_ttl_days,
        &request_id,
    )
    .await
    .map_err(|e| err(request_id, e))?;

    Ok(Json(json!({
        "session_id": pair.session_id,
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "must_change_password": must_change_password,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

pub async fn refresh(State(ctx): State<AppContext>, headers: HeaderMap, Json(body): Json<RefreshRequest>) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let pair = identity::refresh(
        &ctx.pool,
        &body.refresh_token,
        &ctx.config.auth_secret,
        ctx.config.access_ttl_mins,
        ctx.config.refresh_ttl_days,
        &request_id,
    )
    .await
    .map_err(|e| err(request_id, e))?;

    Ok(Json(json!({
        "session_id": pair.session_id,
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
    })))
}

pub async fn logout(State(ctx): State<AppContext>, headers: HeaderMap, tenant: TenantContext) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    let PrincipalKind::OrgUser { session_id } = tenant.kind else {
        return Err(err(request_id, AppError::forbidden("logout requires an org-user session")));
    };

    identity::revoke_session(&ctx.pool, session_id, "logout").await.map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "revoked": true })))
}

pub async fn me(tenant: TenantContext) -> Json<Value> {
    Json(json!({
        "org_id": tenant.org_id,
        "user_id": tenant.user_id,
        "role": tenant.role,
        "request_id": tenant.request_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    new_password: String,
}

pub async fn change_password(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    identity::change_password(&ctx.pool, tenant.user_id, &body.new_password, &request_id)
        .await
        .map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "changed": true })))
}
