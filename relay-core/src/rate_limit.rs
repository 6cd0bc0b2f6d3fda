//! Per-user sliding-window rate limiting.
//!
//! Each session keeps the instants of its recently admitted messages.
//! Entries older than the window are pruned lazily on every check.

use crate::session::Session;
use relay_common::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Instants of recently admitted activity, oldest first.
#[derive(Debug, Default)]
pub struct ActivityLog {
    timestamps: VecDeque<Instant>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry at or before `now - window`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Admits at most `max_per_window` messages in any trailing `window`.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_per_window: usize,
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_per_window: usize) -> Self {
        Self {
            window,
            max_per_window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_per_window)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Check the session's activity and record `now` if admitted.
    ///
    /// Holds only this session's state lock.
    pub fn admit(&self, session: &Session, now: Instant) -> bool {
        let mut state = session.lock();
        let admitted = self.admit_activity(&mut state.activity, now);

        if admitted {
            tracing::debug!(
                user_id = %session.user_id(),
                recent = state.activity.len(),
                "Message admitted"
            );
        } else {
            tracing::info!(
                user_id = %session.user_id(),
                limit = self.max_per_window,
                window_secs = self.window.as_secs(),
                "Message rejected by rate limit"
            );
        }

        admitted
    }

    /// Core check on a bare activity log. A rejection records nothing.
    pub fn admit_activity(&self, activity: &mut ActivityLog, now: Instant) -> bool {
        activity.prune(now, self.window);

        if activity.len() >= self.max_per_window {
            return false;
        }

        activity.timestamps.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn limiter() -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(Duration::from_secs(60), 10)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_eleventh_call_in_window_is_rejected() {
        let limiter = limiter();
        let mut log = ActivityLog::new();
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.admit_activity(&mut log, start + secs(i)), "call {i}");
        }
        assert!(!limiter.admit_activity(&mut log, start + secs(30)));
        assert_eq!(log.len(), 10);
    }

    #[test]
    fn test_nine_prior_admits_the_tenth() {
        let limiter = limiter();
        let mut log = ActivityLog::new();
        let start = Instant::now();

        for _ in 0..9 {
            assert!(limiter.admit_activity(&mut log, start));
        }
        assert!(limiter.admit_activity(&mut log, start + secs(1)));
        assert!(!limiter.admit_activity(&mut log, start + secs(2)));
    }

    #[test]
    fn test_call_after_window_is_admitted() {
        let limiter = limiter();
        let mut log = ActivityLog::new();
        let start = Instant::now();

        for _ in 0..10 {
            assert!(limiter.admit_activity(&mut log, start));
        }
        assert!(!limiter.admit_activity(&mut log, start + secs(59)));
        assert!(limiter.admit_activity(&mut log, start + secs(61)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_entry_exactly_window_old_is_pruned() {
        let limiter = SlidingWindowLimiter::new(secs(60), 1);
        let mut log = ActivityLog::new();
        let start = Instant::now();

        assert!(limiter.admit_activity(&mut log, start));
        assert!(!limiter.admit_activity(&mut log, start + Duration::from_millis(59_999)));
        assert!(limiter.admit_activity(&mut log, start + secs(60)));
    }

    #[test]
    fn test_window_slides_one_entry_at_a_time() {
        let limiter = SlidingWindowLimiter::new(secs(60), 2);
        let mut log = ActivityLog::new();
        let start = Instant::now();

        assert!(limiter.admit_activity(&mut log, start));
        assert!(limiter.admit_activity(&mut log, start + secs(30)));
        assert!(!limiter.admit_activity(&mut log, start + secs(45)));
        // Only the first entry has aged out.
        assert!(limiter.admit_activity(&mut log, start + secs(61)));
        assert!(!limiter.admit_activity(&mut log, start + secs(62)));
    }

    #[test]
    fn test_admit_through_session() {
        let limiter = SlidingWindowLimiter::new(secs(60), 1);
        let session = Session::new(UserId::new(1), 21);
        let other = Session::new(UserId::new(2), 21);
        let now = Instant::now();

        assert!(limiter.admit(&session, now));
        assert!(!limiter.admit(&session, now));
        assert!(limiter.admit(&other, now));
        assert_eq!(session.lock().activity.len(), 1);
    }

    #[test]
    fn test_default_matches_config_defaults() {
        let limiter = SlidingWindowLimiter::default();
        assert_eq!(limiter.window(), secs(60));
        assert_eq!(limiter.max_per_window(), 10);
    }
}
