//! Voucher storage trait.

use crate::StoreError;
use rollcall_types::{SessionId, StudentId, Timestamp};
use serde::{Deserialize, Serialize};

/// A single-use, time-boxed attendance voucher, keyed by its token.
///
/// Bound to (owner, session) at issuance; the binding is checked at
/// redemption against the caller's claim, never the other way around.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRecord {
    pub token: String,
    pub owner: StudentId,
    pub session: SessionId,
    pub expires_at: Timestamp,
    pub consumed: bool,
}

/// Trait for voucher storage with an exclusive row-lock primitive.
pub trait VoucherStore: Send + Sync {
    /// Delete every voucher whose expiry is in the past. Returns the
    /// number of rows removed.
    fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError>;

    /// Persist a freshly issued voucher. The token is the primary key.
    fn insert_voucher(&self, voucher: &VoucherRecord) -> Result<(), StoreError>;

    /// Run `apply` against the voucher row for `token` under an exclusive
    /// lock held for the duration of the call (the backend's equivalent of
    /// `SELECT ... FOR UPDATE`). The closure receives `None` when no row
    /// matches; mutations to the row are committed when the closure
    /// returns. Concurrent calls on the same token serialize.
    fn update_exclusive(
        &self,
        token: &str,
        apply: &mut dyn FnMut(Option<&mut VoucherRecord>),
    ) -> Result<(), StoreError>;
}
