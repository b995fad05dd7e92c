//! Request Rate Limiting
//!
//! Keyed token bucket guarding abuse-prone entry points (the password
//! reset request path in particular). Refill is continuous, proportional
//! to elapsed time over the window.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::{CoreError, CoreResult};

/// Token bucket limiter keyed by caller (typically an IP or user id)
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    max: u32,
    window: Duration,
}

struct Bucket {
    tokens: u32,
    last: Instant,
}

impl RateLimiter {
    /// Limiter admitting `max` requests per `window` per key
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            max,
            window,
        }
    }

    /// Take one token for `key`; `false` when the budget is spent
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.max,
            last: now,
        });

        let elapsed = now.duration_since(entry.last);
        let refill =
            (elapsed.as_secs_f64() / self.window.as_secs_f64() * f64::from(self.max)) as u32;
        entry.tokens = entry.tokens.saturating_add(refill).min(self.max);
        entry.last = now;

        if entry.tokens == 0 {
            return false;
        }
        entry.tokens -= 1;
        true
    }

    /// [`Self::allow`] mapped onto the error taxonomy
    pub fn check(&self, key: &str) -> CoreResult<()> {
        if self.allow(key) {
            Ok(())
        } else {
            Err(CoreError::RateLimited)
        }
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no key has been seen yet
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        // 60 requests/minute, the platform-wide guard for reset requests
        Self::new(60, Duration::from_secs(60))
    }
}
