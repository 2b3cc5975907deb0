//! Sliding-window attempt limiter.
//!
//! Check and record are deliberately decoupled: the orchestrator records
//! only failed biometric-ish attempts, so legitimate rapid polling of the
//! fast path is never penalized.

use rollcall_types::{PipelineParams, StudentId, Timestamp};
use std::collections::HashMap;
use std::sync::Mutex;

/// The actions the limiter tracks, each with its own window per identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardedAction {
    MarkAttendance,
    EnrollBiometric,
}

/// Process-local sliding-window counter per (identity, action).
///
/// Transient by design: losing the windows on restart degrades to "no
/// recent history", never to an unsafe accept.
pub struct RateLimiter {
    limit: usize,
    window_secs: u64,
    key_cap: usize,
    attempts: Mutex<HashMap<(StudentId, GuardedAction), Vec<Timestamp>>>,
}

impl RateLimiter {
    pub fn new(params: &PipelineParams) -> Self {
        Self {
            limit: params.attempt_limit,
            window_secs: params.attempt_window_secs,
            key_cap: params.attempt_key_cap,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Pure check: prunes the window and compares against the cap.
    /// Does not record an attempt.
    pub fn is_limited(&self, identity: StudentId, action: GuardedAction, now: Timestamp) -> bool {
        let mut attempts = self.attempts.lock().unwrap();
        if attempts.len() > self.key_cap {
            tracing::warn!(tracked = attempts.len(), "attempt map over capacity; dropping all windows");
            attempts.clear();
        }
        let Some(window) = attempts.get_mut(&(identity, action)) else {
            return false;
        };
        window.retain(|t| now.seconds_since(*t) < self.window_secs);
        window.len() >= self.limit
    }

    /// Record a failed attempt at `now`.
    pub fn register_attempt(&self, identity: StudentId, action: GuardedAction, now: Timestamp) {
        self.attempts
            .lock()
            .unwrap()
            .entry((identity, action))
            .or_default()
            .push(now);
    }

    /// Seconds until the identity's oldest surviving attempt leaves the
    /// window; 0 when not limited.
    pub fn retry_after(&self, identity: StudentId, action: GuardedAction, now: Timestamp) -> u64 {
        let mut attempts = self.attempts.lock().unwrap();
        let Some(window) = attempts.get_mut(&(identity, action)) else {
            return 0;
        };
        window.retain(|t| now.seconds_since(*t) < self.window_secs);
        if window.len() < self.limit {
            return 0;
        }
        let Some(oldest) = window.iter().min() else {
            return 0;
        };
        self.window_secs.saturating_sub(now.seconds_since(*oldest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDENT: StudentId = StudentId(7);

    fn limiter() -> RateLimiter {
        RateLimiter::new(&PipelineParams::defaults())
    }

    #[test]
    fn fresh_identity_is_not_limited() {
        let limiter = limiter();
        assert!(!limiter.is_limited(STUDENT, GuardedAction::MarkAttendance, Timestamp::new(0)));
        assert_eq!(limiter.retry_after(STUDENT, GuardedAction::MarkAttendance, Timestamp::new(0)), 0);
    }

    #[test]
    fn checking_does_not_count_as_an_attempt() {
        let limiter = limiter();
        let now = Timestamp::new(100);
        for _ in 0..20 {
            assert!(!limiter.is_limited(STUDENT, GuardedAction::MarkAttendance, now));
        }
    }

    #[test]
    fn limit_engages_at_cap_and_expires_with_window() {
        let limiter = limiter();
        let action = GuardedAction::MarkAttendance;
        let start = Timestamp::new(1000);

        for i in 0..3 {
            limiter.register_attempt(STUDENT, action, start.plus(i));
        }
        assert!(limiter.is_limited(STUDENT, action, start.plus(3)));

        // The first attempt (at start) falls out of the 60s window.
        assert!(!limiter.is_limited(STUDENT, action, start.plus(60)));
    }

    #[test]
    fn retry_after_tracks_oldest_entry() {
        let limiter = limiter();
        let action = GuardedAction::MarkAttendance;
        let start = Timestamp::new(0);

        limiter.register_attempt(STUDENT, action, start);
        limiter.register_attempt(STUDENT, action, start.plus(10));
        limiter.register_attempt(STUDENT, action, start.plus(20));

        // Oldest entry at t=0 leaves the window at t=60.
        assert_eq!(limiter.retry_after(STUDENT, action, start.plus(30)), 30);
        assert_eq!(limiter.retry_after(STUDENT, action, start.plus(59)), 1);
        assert_eq!(limiter.retry_after(STUDENT, action, start.plus(60)), 0);
    }

    #[test]
    fn actions_are_tracked_independently() {
        let limiter = limiter();
        let now = Timestamp::new(0);
        for _ in 0..3 {
            limiter.register_attempt(STUDENT, GuardedAction::MarkAttendance, now);
        }
        assert!(limiter.is_limited(STUDENT, GuardedAction::MarkAttendance, now));
        assert!(!limiter.is_limited(STUDENT, GuardedAction::EnrollBiometric, now));
    }

    #[test]
    fn over_capacity_map_is_dropped() {
        let limiter = limiter();
        let now = Timestamp::new(0);
        for i in 0..1001 {
            limiter.register_attempt(StudentId(i), GuardedAction::MarkAttendance, now);
        }
        for _ in 0..3 {
            limiter.register_attempt(STUDENT, GuardedAction::MarkAttendance, now);
        }
        // The check notices the oversized map, clears it, and the
        // identity starts from a clean window.
        assert!(!limiter.is_limited(STUDENT, GuardedAction::MarkAttendance, now));
    }
}
