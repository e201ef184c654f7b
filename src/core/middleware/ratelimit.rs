//! Rate limiting module using pingora-limits CM-Sketch.
//!
//! Fixed one-minute window per client key. The ceiling is passed in on every
//! check so it can change at runtime.

use pingora_limits::rate::Rate;
use std::sync::Arc;
use std::time::Duration;

pub struct RateLimiter {
    window: Arc<Rate>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Creates a new `RateLimiter` with a 60 second window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: Arc::new(Rate::new(Duration::from_secs(60))),
        }
    }

    /// Records one request for `key` and reports whether it is within `limit`
    /// requests for the current window.
    #[must_use]
    pub fn check_and_record(&self, key: &str, limit: u32) -> bool {
        let seen = self.window.observe(&key, 1);
        i64::try_from(seen).unwrap_or(i64::MAX) <= i64::from(limit)
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            window: Arc::clone(&self.window),
        }
    }
}
