//! Rate limiter (spec.md §4.6): keyed by `(client_ip_or_token, route_group)`.
//! A process-local sliding window guarded by a mutex, and a shared-store
//! backend for multi-instance deployments. The shared backend fails *open*
//! on outage — a denied request during an infra incident is worse than an
//! occasional missed limit.

pub mod client_ip;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// A sliding window of request timestamps for one `(key, route_group)`.
struct Window {
    hits: Vec<Instant>,
}

/// Process-local rate limiter: one mutex-guarded map of sliding windows.
/// Mirrors the teacher's `SlidingWindow` per-account tracker, generalized
/// from `account_id` to `(client_ip_or_token, route_group)`.
pub struct LocalLimiter {
    windows: Mutex<HashMap<(String, String), Window>>,
    per_minute: u32,
}

impl LocalLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self { windows: Mutex::new(HashMap::new()), per_minute }
    }

    /// Returns `true` if the request is allowed under the limit for this key.
    pub fn check(&self, key: &str, route_group: &str) -> bool {
        let now = Instant::now();
        let window_start = now - Duration::from_secs(60);
        let mut windows = self.windows.lock().expect("ratelimit mutex poisoned");
        let entry = windows
            .entry((key.to_string(), route_group.to_string()))
            .or_insert_with(|| Window { hits: Vec::new() });
        entry.hits.retain(|t| *t >= window_start);
        if entry.hits.len() as u32 >= self.per_minute {
            return false;
        }
        entry.hits.push(now);
        true
    }
}

/// Shared-store backend contract (e.g. Redis-style atomic counters). On
/// outage callers must fail open — see [`SharedLimiter::check`] docs.
#[async_trait]
pub trait SharedLimiter: Send + Sync {
    /// Returns `Ok(true)` if allowed, `Ok(false)` if denied, `Err` on store
    /// outage. Callers treat `Err` as "allowed" but record a counter.
    async fn check(&self, key: &str, route_group: &str, per_minute: u32) -> anyhow::Result<bool>;
}

pub enum Limiter {
    Local(LocalLimiter),
    Shared(Box<dyn SharedLimiter>),
}

impl Limiter {
    /// Check the rate limit, failing open on shared-store outage.
    /// Returns `(allowed, failed_open)` so the caller can bump a metric.
    pub async fn check(&self, key: &str, route_group: &str, per_minute: u32) -> (bool, bool) {
        match self {
            Limiter::Local(local) => (local.check(key, route_group), false),
            Limiter::Shared(shared) => match shared.check(key, route_group, per_minute).await {
                Ok(allowed) => (allowed, false),
                Err(_) => (true, true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_under_limit_and_denies_over() {
        let limiter = LocalLimiter::new(3);
        assert!(limiter.check("1.2.3.4", "public"));
        assert!(limiter.check("1.2.3.4", "public"));
        assert!(limiter.check("1.2.3.4", "public"));
        assert!(!limiter.check("1.2.3.4", "public"));
    }

    #[test]
    fn route_groups_are_independent() {
        let limiter = LocalLimiter::new(1);
        assert!(limiter.check("1.2.3.4", "public"));
        assert!(limiter.check("1.2.3.4", "admin"));
    }
}
