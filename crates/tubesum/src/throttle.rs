//! Inter-job rate limiting.
//!
//! One component, invoked once between pipeline runs, instead of sleeps
//! scattered through the stages. External platforms see at most one video
//! worth of requests per delay window.

use std::time::Duration;

/// Default pause between processed videos.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A limiter that never sleeps (tests).
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Blocks for the configured delay.
    pub fn pause(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}
