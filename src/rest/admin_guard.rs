//! Admin route gating (spec.md §4.14). Reached either by an `OrgUser`
//! session whose role is `Owner`/`Admin`, or by a Basic-auth
//! `AdminOperator` principal (`tenant::resolve_admin_basic`, which already
//! assigns it `Role::Owner`). This gate enforces that role restriction plus
//! the IP allowlist and read-only/break-glass checks that apply regardless
//! of principal kind.

use std::net::IpAddr;

use axum::http::HeaderMap;

use crate::admin::gate;
use crate::error::AppError;
use crate::policy::Role;
use crate::tenant::TenantContext;
use crate::AppContext;

/// Require the caller hold `Owner` or `Admin` and pass the IP allowlist;
/// when `is_write` also enforce the read-only toggle, honoring a
/// `X-Break-Glass-Token` header that verifies against the caller's org.
pub async fn enforce(
    ctx: &AppContext,
    tenant: &TenantContext,
    addr: IpAddr,
    headers: &HeaderMap,
    is_write: bool,
) -> Result<(), AppError> {
    if !matches!(tenant.role, Role::Owner | Role::Admin) {
        return Err(AppError::forbidden("admin routes require the owner or admin role"));
    }

    if !gate::ip_allowed(&ctx.config.admin_ip_allowlist, addr) {
        return Err(AppError::forbidden("caller ip is not on the admin allowlist"));
    }

    let break_glass_override = match headers.get("x-break-glass-token").and_then(|v| v.to_str().ok()) {
        Some(token) => gate::verify_break_glass(&ctx.pool, tenant.org_id, token).await?,
        None => false,
    };

    gate::enforce_read_only(ctx.config.admin_read_only, is_write, break_glass_override)
}
