//! In-memory fixed-window rate limiter
//!
//! Keyed by an opaque string (the redemption endpoint keys by device
//! identifier). Windows are one minute; counters for stale windows are
//! evicted lazily on access so the map stays bounded under normal traffic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Upper bound on tracked keys. If an attacker rotates identifiers we evict
/// the oldest windows rather than growing without bound.
const MAX_TRACKED_KEYS: usize = 10_000;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left in the current window (0 when rejected).
    pub remaining: u32,
    /// Seconds until the window resets, set when rejected.
    pub retry_after_seconds: Option<u64>,
}

/// Fixed-window limiter shared across request handlers.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimiter {
    pub fn new_in_memory() -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check and count one request for `key` against `limit` per minute.
    pub async fn check(&self, key: &str, limit: u32) -> RateLimitResult {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() >= MAX_TRACKED_KEYS && !windows.contains_key(key) {
            Self::evict_oldest(&mut windows);
        }

        let state = windows.entry(key.to_string()).or_insert(WindowState {
            window_start: now,
            count: 0,
        });

        if now.duration_since(state.window_start) >= WINDOW {
            state.window_start = now;
            state.count = 0;
        }

        if state.count >= limit {
            let elapsed = now.duration_since(state.window_start);
            let retry_after = WINDOW.saturating_sub(elapsed).as_secs().max(1);
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after_seconds: Some(retry_after),
            };
        }

        state.count += 1;
        RateLimitResult {
            allowed: true,
            remaining: limit - state.count,
            retry_after_seconds: None,
        }
    }

    fn evict_oldest(windows: &mut HashMap<String, WindowState>) {
        if let Some(oldest) = windows
            .iter()
            .min_by_key(|(_, s)| s.window_start)
            .map(|(k, _)| k.clone())
        {
            windows.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_allowed() {
        let limiter = RateLimiter::new_in_memory();
        let result = limiter.check("1.2.3.4", 10).await;
        assert!(result.allowed);
        assert_eq!(result.remaining, 9);
    }

    #[tokio::test]
    async fn rejects_past_limit() {
        let limiter = RateLimiter::new_in_memory();
        for i in 0..10 {
            let result = limiter.check("1.2.3.4", 10).await;
            assert!(result.allowed, "request {} should be allowed", i);
        }
        let result = limiter.check("1.2.3.4", 10).await;
        assert!(!result.allowed);
        assert!(result.retry_after_seconds.is_some());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new_in_memory();
        for _ in 0..10 {
            limiter.check("1.2.3.4", 10).await;
        }
        let result = limiter.check("5.6.7.8", 10).await;
        assert!(result.allowed);
    }
}
