use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::policy::RateLimitPolicy;

#[derive(Debug, Clone)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub window: Duration,
    /// Time until the key's window resets.
    pub reset_after: Duration,
}

impl RateDecision {
    /// `RateLimit-*` response headers (IETF draft 6). Rejections also carry
    /// `Retry-After`.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let reset_secs = ceil_secs(self.reset_after);
        let mut headers = vec![
            ("RateLimit-Policy", format!("{};w={}", self.limit, self.window.as_secs())),
            ("RateLimit-Limit", self.limit.to_string()),
            ("RateLimit-Remaining", self.remaining.to_string()),
            ("RateLimit-Reset", reset_secs.to_string()),
        ];
        if !self.allowed {
            headers.push(("Retry-After", reset_secs.to_string()));
        }
        headers
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Per-key fixed-window counter for one policy. Keys are usually client IPs.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one request for `key` and decide whether it may proceed.
    /// Rejected requests still count towards the window.
    pub fn check(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self.lock();
        let window = windows.entry(key.to_string()).or_insert_with(|| Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(window.started) >= self.policy.window {
            window.started = now;
            window.hits = 0;
        }
        window.hits = window.hits.saturating_add(1);

        let allowed = window.hits <= self.policy.max;
        let reset_after = self
            .policy
            .window
            .saturating_sub(now.duration_since(window.started));
        if !allowed {
            warn!(policy = self.policy.name, key, hits = window.hits, "rate limit exceeded");
        }

        RateDecision {
            allowed,
            limit: self.policy.max,
            remaining: self.policy.max.saturating_sub(window.hits),
            window: self.policy.window,
            reset_after,
        }
    }

    /// Report how the request for `key` ended. Successful requests are
    /// refunded when the policy skips them.
    pub fn record_outcome(&self, key: &str, success: bool) {
        if !success || !self.policy.skip_successful_requests {
            return;
        }
        let mut windows = self.lock();
        if let Some(window) = windows.get_mut(key) {
            window.hits = window.hits.saturating_sub(1);
        }
    }

    /// Drop windows that have already ended.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        let span = self.policy.window;
        windows.retain(|_, w| now.duration_since(w.started) < span);
        let purged = before - windows.len();
        if purged > 0 {
            debug!(policy = self.policy.name, purged, "purged expired rate-limit windows");
        }
        purged
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }
}
