//! Sliding-window rate limiter for outbound provider calls.
//!
//! An admission check, not a queue: rejected calls are not buffered or
//! retried here — the caller decides what to do. The window is shared
//! process-wide by handing one limiter (behind an `Arc`) to every
//! component that makes provider calls.
//!
//! Constructor-injected rather than module-level state so tests can
//! instantiate independent limiters and drive the clock through
//! [`check_at`](RateLimiter::check_at).

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default: 20 admitted calls per 60-second window.
pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Observability snapshot of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub used: usize,
    pub limit: usize,
    pub remaining: usize,
}

/// Time-windowed admission gate.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Check admission at the current time.
    pub fn check(&self) -> bool {
        self.check_at(Instant::now())
    }

    /// Check admission at an explicit time (test clock control).
    ///
    /// Evicts timestamps older than the window, rejects without recording
    /// when the window is full, otherwise records `now` and admits.
    pub fn check_at(&self, now: Instant) -> bool {
        let mut timestamps = match self.timestamps.lock() {
            Ok(guard) => guard,
            // Poisoned lock: fail closed, never bypass the gate.
            Err(_) => return false,
        };

        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.limit {
            tracing::debug!(used = timestamps.len(), limit = self.limit, "rate limit hit");
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Current window usage, without evicting or recording.
    pub fn status(&self) -> RateLimitStatus {
        let used = self.timestamps.lock().map(|t| t.len()).unwrap_or(self.limit);
        RateLimitStatus {
            used,
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = RateLimiter::default();
        let now = Instant::now();
        for _ in 0..DEFAULT_LIMIT {
            assert!(limiter.check_at(now));
        }
        assert!(!limiter.check_at(now));
    }

    #[test]
    fn test_window_expiry_readmits() {
        let limiter = RateLimiter::default();
        let base = Instant::now();
        for _ in 0..DEFAULT_LIMIT {
            assert!(limiter.check_at(base));
        }
        assert!(!limiter.check_at(base));

        // Just inside the window: still rejected.
        assert!(!limiter.check_at(base + DEFAULT_WINDOW - Duration::from_millis(1)));
        // Past the window: old timestamps evict, call admitted.
        assert!(limiter.check_at(base + DEFAULT_WINDOW));
    }

    #[test]
    fn test_rejection_does_not_record() {
        let limiter = RateLimiter::new(1, DEFAULT_WINDOW);
        let base = Instant::now();
        assert!(limiter.check_at(base));
        // Several rejected calls must not extend the window occupancy.
        for _ in 0..5 {
            assert!(!limiter.check_at(base + Duration::from_secs(1)));
        }
        assert_eq!(limiter.status().used, 1);
        assert!(limiter.check_at(base + DEFAULT_WINDOW));
    }

    #[test]
    fn test_status_snapshot() {
        let limiter = RateLimiter::new(5, DEFAULT_WINDOW);
        let now = Instant::now();
        limiter.check_at(now);
        limiter.check_at(now);
        assert_eq!(
            limiter.status(),
            RateLimitStatus { used: 2, limit: 5, remaining: 3 }
        );
    }

    #[test]
    fn test_independent_instances() {
        let a = RateLimiter::new(1, DEFAULT_WINDOW);
        let b = RateLimiter::new(1, DEFAULT_WINDOW);
        let now = Instant::now();
        assert!(a.check_at(now));
        // Exhausting `a` must not affect `b`.
        assert!(!a.check_at(now));
        assert!(b.check_at(now));
    }
}
