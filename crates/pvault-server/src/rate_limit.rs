//! Sliding-window rate limiter for the unlock endpoint.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks attempts within a rolling time window. Process-wide: the vault is
/// single-user and loopback-only, so there is no per-client keying.
pub struct RateLimiter {
    attempts: Mutex<Vec<Instant>>,
    max: usize,
    window: Duration,
}

impl RateLimiter {
    /// A limiter allowing `max` attempts per `window`.
    #[must_use]
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            max,
            window,
        }
    }

    /// Record an attempt. Returns false when the window is full.
    pub fn allow(&self) -> bool {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let cutoff = Instant::now() - self.window;
        attempts.retain(|t| *t > cutoff);

        if attempts.len() >= self.max {
            return false;
        }
        attempts.push(Instant::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.allow());
        }
        assert!(!limiter.allow());
    }

    #[test]
    fn window_expiry_frees_slots() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.allow());
    }
}
