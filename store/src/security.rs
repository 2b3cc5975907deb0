//! Per-identity security state storage trait.

use crate::StoreError;
use rollcall_types::{StudentId, Timestamp};
use serde::{Deserialize, Serialize};

/// Lockout bookkeeping for one identity.
///
/// The two counters are independent by design: credential brute force and
/// biometric abuse escalate on their own thresholds and never feed each
/// other. A `locked_until` in the past means unlocked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityState {
    pub failed_credentials: u32,
    pub biometric_violations: u32,
    pub locked_until: Option<Timestamp>,
    pub last_failure: Option<Timestamp>,
}

/// Trait for security state operations.
pub trait SecurityStateStore: Send + Sync {
    /// Current state for the identity; the default state when none is stored.
    fn get_security_state(&self, identity: StudentId) -> Result<SecurityState, StoreError>;

    /// Read-modify-write under the backend's row lock; returns the state
    /// as committed. Concurrent updates for one identity serialize.
    fn update_security_state(
        &self,
        identity: StudentId,
        apply: &mut dyn FnMut(&mut SecurityState),
    ) -> Result<SecurityState, StoreError>;
}
