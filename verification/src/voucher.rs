//! Voucher service — issues and redeems single-use attendance vouchers.
//!
//! A voucher is bound to (owner, session) at issuance; redemption checks
//! the binding against the caller's claim rather than trusting
//! client-supplied values, which defeats token substitution. The
//! check-then-mark sequence runs entirely under the store's exclusive row
//! lock: that lock is what turns "at most one successful redemption" from
//! a best-effort check into a guarantee.

use rollcall_crypto::{mint_token, CryptoError};
use rollcall_store::{StoreError, VoucherRecord, VoucherStore};
use rollcall_types::{PipelineParams, SessionId, StudentId, Timestamp};
use std::sync::Arc;
use thiserror::Error;

/// Why a redemption was refused.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum VoucherRejection {
    #[error("invalid or unknown voucher")]
    NotFound,

    #[error("voucher already used")]
    AlreadyUsed,

    #[error("voucher expired")]
    Expired,

    #[error("voucher bound to a different student or session")]
    Mismatch,
}

#[derive(Debug, Error)]
pub enum VoucherError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum RedeemError {
    #[error(transparent)]
    Rejected(VoucherRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct VoucherService {
    store: Arc<dyn VoucherStore>,
    validity_secs: u64,
}

impl VoucherService {
    pub fn new(store: Arc<dyn VoucherStore>, params: &PipelineParams) -> Self {
        Self {
            store,
            validity_secs: params.voucher_validity_secs,
        }
    }

    /// Issue a fresh voucher for (owner, session).
    ///
    /// Expired vouchers are purged opportunistically before every
    /// issuance, so stale rows never need a background sweeper.
    pub fn issue(
        &self,
        owner: StudentId,
        session: SessionId,
        now: Timestamp,
    ) -> Result<String, VoucherError> {
        let purged = self.store.purge_expired(now)?;
        if purged > 0 {
            tracing::debug!(purged, "dropped expired vouchers");
        }

        let token = mint_token()?;
        self.store.insert_voucher(&VoucherRecord {
            token: token.clone(),
            owner,
            session,
            expires_at: now.plus(self.validity_secs),
            consumed: false,
        })?;
        tracing::debug!(%owner, %session, "voucher issued");
        Ok(token)
    }

    /// Redeem a voucher — exactly once per token, even under races.
    ///
    /// Rejection order: `NotFound`, `AlreadyUsed`, `Expired`, `Mismatch`.
    /// An expired voucher is marked consumed as a side effect, so a retry
    /// reports `AlreadyUsed` rather than `Expired` again.
    pub fn redeem(
        &self,
        token: &str,
        claimed_owner: StudentId,
        claimed_session: SessionId,
        now: Timestamp,
    ) -> Result<(), RedeemError> {
        let mut outcome = Err(VoucherRejection::NotFound);
        self.store.update_exclusive(token, &mut |row| {
            outcome = match row {
                None => Err(VoucherRejection::NotFound),
                Some(voucher) if voucher.consumed => Err(VoucherRejection::AlreadyUsed),
                Some(voucher) if voucher.expires_at.is_past(now) => {
                    voucher.consumed = true;
                    Err(VoucherRejection::Expired)
                }
                Some(voucher)
                    if voucher.owner != claimed_owner || voucher.session != claimed_session =>
                {
                    Err(VoucherRejection::Mismatch)
                }
                Some(voucher) => {
                    voucher.consumed = true;
                    Ok(())
                }
            };
        })?;
        outcome.map_err(RedeemError::Rejected)
    }
}
