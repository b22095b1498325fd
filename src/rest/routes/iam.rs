//! IAM (spec.md §4.1, §6): inviting org users, listing them, admin-forced
//! password resets, and bulk session revocation. No dedicated domain module
//! backs this — these are thin, RBAC-gated wrappers straight over the
//! `users` table `identity::authenticate` already reads.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::http::error::AppErrorResponse;
use crate::identity::password;
use crate::identity::session;
use crate::identity::tokens::generate_opaque_token;
use crate::policy::rbac::{check_authorized, Role};
use crate::policy::{enforce_worker_quota, plan_for_org};
use crate::rest::extract;
use crate::tenant::TenantContext;
use crate::AppContext;

fn err(request_id: String, error: AppError) -> AppErrorResponse {
    AppErrorResponse { request_id, error }
}

#[derive(Debug, Deserialize)]
pub struct InviteUserRequest {
    email: String,
    role: Role,
}

/// Invite a user: creates the row with a random opaque temp password
/// (never logged) and `must_change_password = true`, so the invitee's
/// first `POST /v1/auth/login` forces `POST /v1/auth/change-password`.
pub async fn invite_user(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Json(body): Json<InviteUserRequest>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    check_authorized(tenant.role, "iam.invite").map_err(|e| err(request_id.clone(), e))?;

    let plan = plan_for_org(&ctx.pool, tenant.org_id).await.map_err(|e| err(request_id.clone(), e))?;
    enforce_worker_quota(&ctx.pool, tenant.org_id, plan).await.map_err(|e| err(request_id.clone(), e))?;

    let (temp_password, _) = generate_opaque_token();
    let hash = password::hash_password(&temp_password)
        .map_err(|e| err(request_id.clone(), AppError::Internal(anyhow::anyhow!("password hash failed: {e}"))))?;

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, org_id, email, role, password_hash, must_change_password, created_at)
         VALUES ($1, $2, lower($3), $4, $5, true, now())",
    )
    .bind(id)
    .bind(tenant.org_id)
    .bind(&body.email)
    .bind(body.role)
    .bind(hash)
    .execute(&ctx.pool)
    .await
    .map_err(|e| err(request_id, AppError::from(e)))?;

    Ok(Json(json!({ "id": id, "email": body.email, "role": body.role, "temp_password": temp_password })))
}

pub async fn list_users(State(ctx): State<AppContext>, headers: HeaderMap, tenant: TenantContext) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    check_authorized(tenant.role, "iam.invite").map_err(|e| err(request_id.clone(), e))?;

    let rows: Vec<(Uuid, String, Role, bool)> = sqlx::query_as(
        "SELECT id, email, role, must_change_password FROM users WHERE org_id = $1 ORDER BY email",
    )
    .bind(tenant.org_id)
    .fetch_all(&ctx.pool)
    .await
    .map_err(|e| err(request_id, AppError::from(e)))?;

    let users: Vec<_> = rows
        .into_iter()
        .map(|(id, email, role, must_change_password)| json!({ "id": id, "email": email, "role": role, "must_change_password": must_change_password }))
        .collect();
    Ok(Json(json!({ "users": users })))
}

/// Admin-forced reset: mints a fresh temp password, flips
/// `must_change_password`, and revokes every existing session for the
/// target user so a stolen access token stops working immediately.
pub async fn reset_password(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    axum::extract::Path(user_id): axum::extract::Path<Uuid>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    check_authorized(tenant.role, "iam.reset").map_err(|e| err(request_id.clone(), e))?;

    let (temp_password, _) = generate_opaque_token();
    let hash = password::hash_password(&temp_password)
        .map_err(|e| err(request_id.clone(), AppError::Internal(anyhow::anyhow!("password hash failed: {e}"))))?;

    let result = sqlx::query("UPDATE users SET password_hash = $2, must_change_password = true WHERE id = $1 AND org_id = $3")
        .bind(user_id)
        .bind(hash)
        .bind(tenant.org_id)
        .execute(&ctx.pool)
        .await
        .map_err(|e| err(request_id.clone(), AppError::from(e)))?;
    if result.rows_affected() == 0 {
        return Err(err(request_id, AppError::not_found("user")));
    }

    session::revoke_all_for_user(&ctx.pool, user_id, "admin_reset", &request_id)
        .await
        .map_err(|e| err(request_id, e))?;

    Ok(Json(json!({ "temp_password": temp_password })))
}

#[derive(Debug, Deserialize)]
pub struct LogoutAllRequest {
    user_id: Uuid,
}

pub async fn logout_all_for_user(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    tenant: TenantContext,
    Json(body): Json<LogoutAllRequest>,
) -> Result<Json<Value>, AppErrorResponse> {
    let request_id = extract::request_id(&headers);
    check_authorized(tenant.role, "iam.reset").map_err(|e| err(request_id.clone(), e))?;

    let revoked = session::revoke_all_for_user(&ctx.pool, body.user_id, "admin_logout_all", &request_id)
        .await
        .map_err(|e| err(request_id, e))?;
    Ok(Json(json!({ "revoked_sessions": revoked })))
}
