//! Lockout state — per-identity suspension windows.
//!
//! Two independent counters with their own thresholds and lock windows:
//! credential brute force and biometric abuse never feed each other.
//! Locks are always time-bounded and self-expiring, never permanent —
//! the heuristic layers upstream will sometimes be wrong about honest
//! users, and the lock bounds the damage of those false positives.

use rollcall_store::{SecurityStateStore, StoreError};
use rollcall_types::{PipelineParams, StudentId, Timestamp};
use std::sync::Arc;

pub struct LockoutEngine {
    store: Arc<dyn SecurityStateStore>,
    credential_threshold: u32,
    credential_lock_secs: u64,
    biometric_threshold: u32,
    biometric_lock_secs: u64,
}

impl LockoutEngine {
    pub fn new(store: Arc<dyn SecurityStateStore>, params: &PipelineParams) -> Self {
        Self {
            store,
            credential_threshold: params.credential_lock_threshold,
            credential_lock_secs: params.credential_lock_secs,
            biometric_threshold: params.biometric_lock_threshold,
            biometric_lock_secs: params.biometric_lock_secs,
        }
    }

    /// Record a failed credential check. Returns whether this call
    /// engaged the lock; crossing the threshold resets the counter.
    pub fn register_failed_credential(
        &self,
        identity: StudentId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut engaged = false;
        let threshold = self.credential_threshold;
        let lock_secs = self.credential_lock_secs;
        self.store.update_security_state(identity, &mut |state| {
            state.failed_credentials += 1;
            state.last_failure = Some(now);
            if state.failed_credentials >= threshold {
                state.locked_until = Some(now.plus(lock_secs));
                state.failed_credentials = 0;
                engaged = true;
            }
        })?;
        if engaged {
            tracing::warn!(%identity, "account locked: credential brute force");
        }
        Ok(engaged)
    }

    /// Record a confirmed biometric violation. Returns whether this call
    /// engaged the (shorter) biometric lock.
    pub fn register_biometric_violation(
        &self,
        identity: StudentId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut engaged = false;
        let threshold = self.biometric_threshold;
        let lock_secs = self.biometric_lock_secs;
        self.store.update_security_state(identity, &mut |state| {
            state.biometric_violations += 1;
            state.last_failure = Some(now);
            if state.biometric_violations >= threshold {
                state.locked_until = Some(now.plus(lock_secs));
                state.biometric_violations = 0;
                engaged = true;
            }
        })?;
        if engaged {
            tracing::warn!(%identity, "account locked: biometric abuse");
        }
        Ok(engaged)
    }

    /// Whether the identity is currently suspended. An expired lock is
    /// lazily cleared the first time it is observed as past.
    pub fn is_locked(&self, identity: StudentId, now: Timestamp) -> Result<bool, StoreError> {
        let state = self.store.get_security_state(identity)?;
        match state.locked_until {
            None => Ok(false),
            Some(until) if until.is_past(now) => {
                self.store.update_security_state(identity, &mut |state| {
                    if state.locked_until.is_some_and(|u| u.is_past(now)) {
                        state.locked_until = None;
                    }
                })?;
                Ok(false)
            }
            Some(_) => Ok(true),
        }
    }

    /// Fresh enrollment is a trust reset for the biometric counter only;
    /// the credential counter is untouched by registration.
    pub fn clear_biometric_violations(&self, identity: StudentId) -> Result<(), StoreError> {
        self.store.update_security_state(identity, &mut |state| {
            state.biometric_violations = 0;
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_nullables::MemoryStore;

    const STUDENT: StudentId = StudentId(4);

    fn engine(store: &Arc<MemoryStore>) -> LockoutEngine {
        let security: Arc<dyn SecurityStateStore> = store.clone();
        LockoutEngine::new(security, &PipelineParams::defaults())
    }

    #[test]
    fn credential_lock_engages_at_threshold_and_resets_counter() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let now = Timestamp::new(1000);

        for _ in 0..7 {
            assert!(!engine.register_failed_credential(STUDENT, now).unwrap());
        }
        assert!(!engine.is_locked(STUDENT, now).unwrap());

        assert!(engine.register_failed_credential(STUDENT, now).unwrap());
        assert!(engine.is_locked(STUDENT, now).unwrap());
        assert_eq!(store.get_security_state(STUDENT).unwrap().failed_credentials, 0);
    }

    #[test]
    fn biometric_lock_uses_its_own_threshold_and_window() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let now = Timestamp::new(1000);

        assert!(!engine.register_biometric_violation(STUDENT, now).unwrap());
        assert!(!engine.register_biometric_violation(STUDENT, now).unwrap());
        assert!(engine.register_biometric_violation(STUDENT, now).unwrap());

        // Locked for the 10-minute biometric window...
        assert!(engine.is_locked(STUDENT, now.plus(599)).unwrap());
        assert!(engine.is_locked(STUDENT, now.plus(600)).unwrap());
        // ...and self-expires without any explicit reset.
        assert!(!engine.is_locked(STUDENT, now.plus(601)).unwrap());
        assert_eq!(store.get_security_state(STUDENT).unwrap().locked_until, None);
    }

    #[test]
    fn counters_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let now = Timestamp::new(0);

        for _ in 0..2 {
            engine.register_biometric_violation(STUDENT, now).unwrap();
        }
        for _ in 0..7 {
            engine.register_failed_credential(STUDENT, now).unwrap();
        }

        let state = store.get_security_state(STUDENT).unwrap();
        assert_eq!(state.biometric_violations, 2);
        assert_eq!(state.failed_credentials, 7);
        assert!(!engine.is_locked(STUDENT, now).unwrap());
    }

    #[test]
    fn enrollment_reset_clears_biometric_counter_only() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let now = Timestamp::new(0);

        engine.register_biometric_violation(STUDENT, now).unwrap();
        engine.register_failed_credential(STUDENT, now).unwrap();
        engine.clear_biometric_violations(STUDENT).unwrap();

        let state = store.get_security_state(STUDENT).unwrap();
        assert_eq!(state.biometric_violations, 0);
        assert_eq!(state.failed_credentials, 1);
    }
}
