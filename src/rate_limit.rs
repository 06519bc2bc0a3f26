use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::config::RateLimitConfig;

/// Chance that a check also sweeps expired entries.
const PURGE_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Result of counting one request against its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_in: Duration,
    },
    Rejected {
        limit: u32,
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateDecision::Allowed { limit, .. } | RateDecision::Rejected { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateDecision::Allowed { remaining, .. } => *remaining,
            RateDecision::Rejected { .. } => 0,
        }
    }

    /// Time until the caller's window resets.
    pub fn reset_in(&self) -> Duration {
        match self {
            RateDecision::Allowed { reset_in, .. } => *reset_in,
            RateDecision::Rejected { retry_after, .. } => *retry_after,
        }
    }
}

/// Fixed-window request counter keyed per caller.
///
/// Constructed once at process start and shared by reference; the map
/// handles concurrent access per key.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max: u32,
    message: String,
    store: DashMap<String, WindowEntry>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max: u32, message: impl Into<String>) -> Self {
        Self {
            window,
            max,
            message: message.into(),
            store: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Duration::from_secs(config.window_secs),
            config.max_requests,
            config.message.clone(),
        )
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        if rand::random::<f64>() < PURGE_PROBABILITY {
            self.purge_expired(now);
        }
        self.check_at(key, now)
    }

    /// Count one request for `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + self.window,
            });

        if now >= entry.reset_at {
            *entry = WindowEntry {
                count: 0,
                reset_at: now + self.window,
            };
        }

        entry.count = entry.count.saturating_add(1);
        let reset_in = entry.reset_at.saturating_duration_since(now);

        trace!(key, count = entry.count, max = self.max, "Rate limit check");

        if entry.count > self.max {
            debug!(key, count = entry.count, "Rate limit exceeded");
            RateDecision::Rejected {
                limit: self.max,
                retry_after: reset_in,
            }
        } else {
            RateDecision::Allowed {
                limit: self.max,
                remaining: self.max - entry.count,
                reset_in,
            }
        }
    }

    /// Drop entries whose window has ended.
    pub fn purge_expired(&self, now: Instant) {
        self.store.retain(|_, entry| now < entry.reset_at);
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32) -> FixedWindowLimiter {
        FixedWindowLimiter::new(Duration::from_secs(60), max, "slow down")
    }

    #[test]
    fn test_allows_up_to_max() {
        let limiter = limiter(2);
        let now = Instant::now();

        let first = limiter.check_at("1.2.3.4", now);
        assert!(first.is_allowed());
        assert_eq!(first.remaining(), 1);
        assert_eq!(first.limit(), 2);

        assert_eq!(limiter.check_at("1.2.3.4", now).remaining(), 0);

        let third = limiter.check_at("1.2.3.4", now + Duration::from_secs(10));
        assert_eq!(
            third,
            RateDecision::Rejected {
                limit: 2,
                retry_after: Duration::from_secs(50),
            }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_allowed());
        assert!(!limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_allowed());
        assert!(!limiter.check_at("a", now).is_allowed());

        let later = now + Duration::from_secs(60);
        let decision = limiter.check_at("a", later);
        assert!(decision.is_allowed());
        assert_eq!(decision.reset_in(), Duration::from_secs(60));
    }

    #[test]
    fn test_purge_expired() {
        let limiter = limiter(5);
        let now = Instant::now();
        limiter.check_at("old", now);
        limiter.check_at("new", now + Duration::from_secs(30));
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.purge_expired(now + Duration::from_secs(61));
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
