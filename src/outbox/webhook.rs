//! Export-webhook handler: validates the destination against an allowlist,
//! rejects non-HTTPS unless explicitly permitted, and blocks private/
//! link-local IP ranges before sending (spec.md §4.5).

use std::net::IpAddr;

use url::Url;

use super::{DispatchOutcome, OutboxItem};

fn is_private_or_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local(),
    }
}

/// `true` if `host` is, or resolves to, a private/link-local/loopback
/// address. An IP literal is checked directly; a DNS hostname is resolved
/// first — skipping resolution would let a hostname that points at
/// private space (rebinding or an internal zone record) through the
/// allowlist unchecked. A resolution failure is treated as blocked: we
/// cannot vouch for a destination we cannot resolve.
async fn resolves_to_blocked_address(host: &str) -> bool {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return is_private_or_link_local(ip);
    }
    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => addrs.map(|addr| addr.ip()).any(is_private_or_link_local),
        Err(_) => true,
    }
}

async fn validate_destination(
    url: &Url,
    allowlist: &[String],
    https_only: bool,
    block_private_ips: bool,
) -> Result<(), String> {
    let host = url.host_str().ok_or_else(|| "webhook url has no host".to_string())?;

    if https_only && url.scheme() != "https" {
        return Err(format!("scheme {} not permitted (https-only)", url.scheme()));
    }

    if !allowlist.iter().any(|h| h == host) {
        return Err(format!("destination host {host} not in export allowlist"));
    }

    if block_private_ips && resolves_to_blocked_address(host).await {
        return Err(format!("destination {host} resolves to a blocked private/link-local address"));
    }

    Ok(())
}

pub async fn handle(
    item: &OutboxItem,
    http: &reqwest::Client,
    allowlist: &[String],
    https_only: bool,
    block_private_ips: bool,
) -> DispatchOutcome {
    let dest = match item.payload.get("url").and_then(|v| v.as_str()) {
        Some(u) => u,
        None => return DispatchOutcome::Poison("webhook payload missing url".to_string()),
    };

    let parsed = match Url::parse(dest) {
        Ok(u) => u,
        Err(e) => return DispatchOutcome::Poison(format!("webhook url unparseable: {e}")),
    };

    if let Err(reason) = validate_destination(&parsed, allowlist, https_only, block_private_ips).await {
        return DispatchOutcome::Blocked(reason);
    }

    let body = item.payload.get("body").cloned().unwrap_or(serde_json::json!({}));
    match http.post(parsed).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => DispatchOutcome::Delivered,
        Ok(resp) if resp.status().is_client_error() => {
            DispatchOutcome::Poison(format!("destination returned {}", resp.status()))
        }
        Ok(resp) => DispatchOutcome::Retry(format!("destination returned {}", resp.status())),
        Err(e) => DispatchOutcome::Retry(format!("transport error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These use IP-literal hosts throughout rather than DNS names so the
    // suite never depends on network access: `resolves_to_blocked_address`
    // only resolves via DNS for a non-IP host.

    #[tokio::test]
    async fn rejects_host_not_in_allowlist() {
        let url = Url::parse("https://203.0.113.9/hook").unwrap();
        let result = validate_destination(&url, &["203.0.113.10".to_string()], true, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_http_when_https_only() {
        let url = Url::parse("http://203.0.113.9/hook").unwrap();
        let result = validate_destination(&url, &["203.0.113.9".to_string()], true, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn blocks_private_ip_literal() {
        let url = Url::parse("https://127.0.0.1/hook").unwrap();
        let result = validate_destination(&url, &["127.0.0.1".to_string()], false, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn allows_valid_https_allowlisted_destination() {
        let url = Url::parse("https://203.0.113.9/hook").unwrap();
        let result = validate_destination(&url, &["203.0.113.9".to_string()], true, true).await;
        assert!(result.is_ok());
    }
}
