//! Tenant Context Middleware (spec.md §4.2): resolves `(org_id, role,
//! principal_kind)` for every request and binds `app.current_org_id` on the
//! request's transaction. Four principal kinds compete for a single
//! request; when more than one credential is presented, highest privilege
//! wins deterministically.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::magic_link;
use crate::identity::tokens::{verify_access_token, AccessClaims};
use crate::identity::worker_token;
use crate::policy::Role;
use crate::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PrincipalRank {
    Client = 0,
    Worker = 1,
    OrgUser = 2,
    AdminOperator = 3,
}

#[derive(Debug, Clone)]
pub enum PrincipalKind {
    /// Authenticated via Basic auth, mapped to an admin role.
    AdminOperator,
    /// Authenticated via a JWT session (`Authorization: Bearer <jwt>`).
    OrgUser { session_id: Uuid },
    /// Authenticated via a signed worker token.
    Worker,
    /// Authenticated via a magic-link token scoped to one booking.
    Client,
}

#[derive(Debug, Clone)]
pub struct TenantContext {
    pub org_id: Uuid,
    pub role: Role,
    pub user_id: Uuid,
    pub kind: PrincipalKind,
    pub request_id: String,
    /// Set only when `kind` is `Worker` — the team the worker token was
    /// scoped to at mint time.
    pub scoped_team_id: Option<Uuid>,
    /// Set only when `kind` is `Client` — the single booking the magic
    /// link was scoped to at mint time.
    pub scoped_booking_id: Option<Uuid>,
}

fn rank(kind: &PrincipalKind) -> PrincipalRank {
    match kind {
        PrincipalKind::AdminOperator => PrincipalRank::AdminOperator,
        PrincipalKind::OrgUser { .. } => PrincipalRank::OrgUser,
        PrincipalKind::Worker => PrincipalRank::Worker,
        PrincipalKind::Client => PrincipalRank::Client,
    }
}

fn request_id_of(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Resolve the org-user candidate from a bearer JWT, if present and valid.
fn resolve_org_user(headers: &HeaderMap, auth_secret: &str) -> Option<(AccessClaims, PrincipalKind)> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?;
    let claims = verify_access_token(auth_secret, token).ok()?;
    Some((claims.clone(), PrincipalKind::OrgUser { session_id: claims.sid }))
}

/// Resolve the admin-operator candidate from HTTP Basic auth against the
/// configured admin credentials (`admin_basic_username` /
/// `admin_basic_password_hash`). `None` if either is unconfigured — admin
/// Basic is opt-in, not a default credential — or if the header is absent,
/// malformed, or the credentials don't match.
///
/// The org an admin-operator acts on is not carried by Basic auth, so it is
/// read from `X-Admin-Org-Id` and falls back to `config::DEFAULT_ORG_ID`,
/// the same resolution the public endpoints use for an unset org (the
/// "default org" Open Question, spec.md §9).
fn resolve_admin_basic(headers: &HeaderMap, ctx: &AppContext) -> Option<PrincipalKind> {
    let username = ctx.config.admin_basic_username.as_deref()?;
    let password_hash = ctx.config.admin_basic_password_hash.as_deref()?;

    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = raw.strip_prefix("Basic ")?;
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (supplied_user, supplied_pass) = decoded.split_once(':')?;

    if !basic_credentials_match(supplied_user, supplied_pass, username, password_hash) {
        return None;
    }

    Some(PrincipalKind::AdminOperator)
}

fn basic_credentials_match(supplied_user: &str, supplied_pass: &str, username: &str, password_hash: &str) -> bool {
    supplied_user == username && crate::identity::password::verify_password(supplied_pass, password_hash).matches
}

/// `X-Admin-Org-Id`, falling back to `config::DEFAULT_ORG_ID` — the org an
/// admin-operator Basic principal acts on, since Basic auth carries no org
/// of its own (see `resolve_admin_basic`).
fn admin_org_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-admin-org-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or(crate::config::DEFAULT_ORG_ID)
}

/// Resolve the four principal kinds and pick the highest-privilege one.
/// Production builds reject an explicit testing-override header
/// (`X-Test-Org-Id`) outright — it only exists for integration tests run
/// with `log == "test"`.
pub fn resolve(
    headers: &HeaderMap,
    ctx: &AppContext,
) -> Result<TenantContext, AppError> {
    let request_id = request_id_of(headers);

    if ctx.config.log != "test" && headers.contains_key("x-test-org-id") {
        return Err(AppError::forbidden("testing override header rejected outside test mode"));
    }

    let mut candidates: Vec<TenantContext> = Vec::new();

    if let Some((claims, kind)) = resolve_org_user(headers, &ctx.config.auth_secret) {
        candidates.push(TenantContext {
            org_id: claims.org_id,
            role: claims.role,
            user_id: claims.sub,
            kind,
            request_id: request_id.clone(),
            scoped_team_id: None,
            scoped_booking_id: None,
        });
    }

    if let Some(kind) = resolve_admin_basic(headers, ctx) {
        candidates.push(TenantContext {
            org_id: admin_org_id(headers),
            role: Role::Owner,
            user_id: Uuid::nil(),
            kind,
            request_id: request_id.clone(),
            scoped_team_id: None,
            scoped_booking_id: None,
        });
    }

    if let Some(principal) = headers
        .get("x-worker-token")
        .and_then(|v| v.to_str().ok())
        .and_then(|token| worker_token::verify(&ctx.config.auth_secret, token))
    {
        candidates.push(TenantContext {
            org_id: principal.org_id,
            role: Role::Viewer,
            user_id: principal.user_id,
            kind: PrincipalKind::Worker,
            request_id: request_id.clone(),
            scoped_team_id: Some(principal.team_id),
            scoped_booking_id: None,
        });
    }

    if let Some(principal) = headers
        .get("x-magic-link-token")
        .and_then(|v| v.to_str().ok())
        .and_then(|token| magic_link::verify(&ctx.config.auth_secret, token))
    {
        candidates.push(TenantContext {
            org_id: principal.org_id,
            role: Role::Viewer,
            user_id: Uuid::nil(),
            kind: PrincipalKind::Client,
            request_id: request_id.clone(),
            scoped_team_id: None,
            scoped_booking_id: Some(principal.booking_id),
        });
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(rank(&c.kind)));

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Unauthenticated)
}

/// Axum extractor so handlers can take `TenantContext` as a parameter.
#[async_trait::async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    AppContext: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AppContext::from_ref(state);
        resolve(&parts.headers, &ctx).map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_orders_admin_above_client() {
        assert!(rank(&PrincipalKind::AdminOperator) > rank(&PrincipalKind::Client));
        assert!(rank(&PrincipalKind::OrgUser { session_id: Uuid::nil() }) > rank(&PrincipalKind::Worker));
    }

    #[test]
    fn basic_credentials_require_matching_username_and_password() {
        let hash = crate::identity::password::hash_password("hunter2").unwrap();
        assert!(basic_credentials_match("ops", "hunter2", "ops", &hash));
        assert!(!basic_credentials_match("ops", "wrong", "ops", &hash));
        assert!(!basic_credentials_match("someone-else", "hunter2", "ops", &hash));
    }

    #[test]
    fn admin_org_id_falls_back_to_default() {
        let headers = HeaderMap::new();
        assert_eq!(admin_org_id(&headers), crate::config::DEFAULT_ORG_ID);
    }

    #[test]
    fn admin_org_id_reads_header_when_present() {
        let org_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-org-id", org_id.to_string().parse().unwrap());
        assert_eq!(admin_org_id(&headers), org_id);
    }
}
