//! Small request-extraction helpers shared by every route module: the
//! client IP used for rate limiting, and the idempotency-key header read
//! for admin writes (spec.md §4.12).

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

use crate::ratelimit::client_ip;
use crate::AppContext;

pub fn client_ip(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>, ctx: &AppContext) -> IpAddr {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip()).unwrap_or(IpAddr::from([0, 0, 0, 0]));
    let forwarded_for = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    client_ip::resolve(peer, forwarded_for, &ctx.config.trusted_proxies)
}

pub fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers.get("idempotency-key").and_then(|v| v.to_str().ok()).map(str::to_string)
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
