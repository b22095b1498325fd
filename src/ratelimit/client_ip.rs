//! Trusted-proxy-aware client IP resolution. Only when the peer address
//! matches a configured trusted CIDR is the first `X-Forwarded-For` entry
//! honored — otherwise a client can spoof its way past the rate limiter.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

pub fn resolve(peer_addr: IpAddr, forwarded_for: Option<&str>, trusted_proxies: &[String]) -> IpAddr {
    let is_trusted = trusted_proxies.iter().any(|cidr| {
        cidr.parse::<IpNetwork>()
            .map(|net| net.contains(peer_addr))
            .unwrap_or(false)
    });

    if !is_trusted {
        return peer_addr;
    }

    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(|s| s.trim())
        .and_then(|s| s.parse::<IpAddr>().ok())
        .unwrap_or(peer_addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_peer_ignores_forwarded_for() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let resolved = resolve(peer, Some("10.0.0.1"), &[]);
        assert_eq!(resolved, peer);
    }

    #[test]
    fn trusted_peer_honors_forwarded_for() {
        let peer: IpAddr = "10.0.0.5".parse().unwrap();
        let resolved = resolve(peer, Some("203.0.113.9, 10.0.0.1"), &["10.0.0.0/8".to_string()]);
        assert_eq!(resolved, "203.0.113.9".parse::<IpAddr>().unwrap());
    }
}
