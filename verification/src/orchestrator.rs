//! Attendance orchestrator — sequences every check into one pass/fail
//! decision and records the outcome.
//!
//! Checks run in a fixed order and short-circuit on the first failure.
//! Adversarial failures are routed to the threat engine with a severity
//! weight; failed biometric-ish steps additionally append to the rate
//! window and bump the biometric violation counter. Input errors and
//! precondition failures are reported to the caller without threat
//! points. Transient backend faults surface as errors, never as
//! accept/deny decisions.

use crate::biometric::{BiometricMatcher, EnrollError, MatchOutcome};
use crate::geofence::GeofenceEvaluator;
use crate::limiter::{GuardedAction, RateLimiter};
use crate::liveness::LivenessEvaluator;
use crate::lockout::LockoutEngine;
use crate::network::NetworkAllowList;
use crate::threat::{ThreatCategory, ThreatContext, ThreatEngine};
use crate::voucher::{RedeemError, VoucherError, VoucherRejection, VoucherService};
use rollcall_crypto::TemplateCipher;
use rollcall_notify::Notifier;
use rollcall_store::{
    AlertStore, AttendanceRecord, AttendanceStore, EnrollmentStore, SecurityStateStore,
    SessionInfo, SessionStore, StoreError, TemplateStore, VoucherStore,
};
use rollcall_types::{
    EmbeddingExtractor, Frame, PipelineParams, SessionId, StudentId, Timestamp,
};
use std::sync::Arc;
use thiserror::Error;

/// Which factors verified a successful marking.
const METHOD_TAG: &str = "face+geo+token+liveness";

/// Everything the pipeline persists through, bundled for construction.
pub struct PipelineStores {
    pub vouchers: Arc<dyn VoucherStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub attendance: Arc<dyn AttendanceStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub security: Arc<dyn SecurityStateStore>,
}

/// One attendance-marking attempt as submitted by the web layer.
#[derive(Clone, Copy, Debug)]
pub struct MarkRequest<'a> {
    pub identity: StudentId,
    pub session: SessionId,
    pub latitude: f64,
    pub longitude: f64,
    pub voucher_token: &'a str,
    /// Camera capture in the raw grayscale container format.
    pub image: &'a [u8],
    pub client_ip: &'a str,
}

/// The successful outcome, echoed back to the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkSuccess {
    pub similarity: f32,
    pub distance_m: f64,
}

/// Why a marking attempt was refused.
#[derive(Debug, Error)]
pub enum MarkFailure {
    #[error("account temporarily locked")]
    AccountLocked,

    #[error("attendance window is not open")]
    SessionNotOpen,

    #[error("not enrolled in this course")]
    NotEnrolled,

    #[error("attendance already marked")]
    AlreadyMarked,

    #[error("too many attempts; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("voucher rejected: {0}")]
    InvalidVoucher(VoucherRejection),

    #[error("face not registered")]
    FaceNotRegistered,

    #[error("invalid image")]
    BadImage,

    #[error("liveness check failed")]
    LivenessFailed,

    #[error("face verification failed")]
    BiometricMismatch,

    #[error("outside allowed campus area")]
    OutsideCampus,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why voucher issuance was refused.
#[derive(Debug, Error)]
pub enum IssueFailure {
    #[error("attendance window is not open")]
    SessionNotOpen,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Voucher(#[from] VoucherError),
}

/// The attendance-marking use case, wired through every subsystem.
pub struct AttendancePipeline {
    vouchers: VoucherService,
    limiter: RateLimiter,
    geofence: GeofenceEvaluator,
    liveness: LivenessEvaluator,
    biometric: BiometricMatcher,
    threats: ThreatEngine,
    lockout: Arc<LockoutEngine>,
    sessions: Arc<dyn SessionStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    attendance: Arc<dyn AttendanceStore>,
    allow_list: NetworkAllowList,
    grace_secs: u64,
}

impl AttendancePipeline {
    pub fn new(
        stores: PipelineStores,
        extractor: Arc<dyn EmbeddingExtractor>,
        cipher: TemplateCipher,
        notifier: Arc<dyn Notifier>,
        allow_list: NetworkAllowList,
        params: &PipelineParams,
    ) -> Self {
        let lockout = Arc::new(LockoutEngine::new(stores.security, params));
        Self {
            vouchers: VoucherService::new(stores.vouchers, params),
            limiter: RateLimiter::new(params),
            geofence: GeofenceEvaluator::new(params),
            liveness: LivenessEvaluator::new(params),
            biometric: BiometricMatcher::new(
                extractor,
                stores.templates,
                Arc::new(cipher),
                params,
            ),
            threats: ThreatEngine::new(stores.alerts, notifier, lockout.clone(), params),
            lockout,
            sessions: stores.sessions,
            enrollments: stores.enrollments,
            attendance: stores.attendance,
            allow_list,
            grace_secs: params.session_grace_secs,
        }
    }

    /// Issue an attendance voucher, once the session window is open.
    pub fn issue_voucher(
        &self,
        identity: StudentId,
        session_id: SessionId,
        now: Timestamp,
    ) -> Result<String, IssueFailure> {
        let session = self
            .sessions
            .get_session(session_id)?
            .ok_or(IssueFailure::SessionNotOpen)?;
        if !self.window_open(&session, now) {
            return Err(IssueFailure::SessionNotOpen);
        }
        Ok(self.vouchers.issue(identity, session_id, now)?)
    }

    /// Enroll (or re-enroll) the caller's biometric template.
    ///
    /// A successful enrollment is a trust reset: the accumulated
    /// biometric-abuse counter is cleared.
    pub fn enroll_biometric(
        &self,
        identity: StudentId,
        frames: &[Frame],
        now: Timestamp,
    ) -> Result<(), EnrollError> {
        self.biometric.enroll(identity, frames, now)?;
        self.lockout.clear_biometric_violations(identity)?;
        Ok(())
    }

    /// Expose the credential brute-force path for the login layer.
    pub fn register_failed_credential(
        &self,
        identity: StudentId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        self.lockout.register_failed_credential(identity, now)
    }

    /// Process one attendance-marking attempt.
    pub fn mark_attendance(
        &self,
        request: &MarkRequest<'_>,
        now: Timestamp,
    ) -> Result<MarkSuccess, MarkFailure> {
        let identity = request.identity;

        if self.lockout.is_locked(identity, now)? {
            return Err(MarkFailure::AccountLocked);
        }

        let session = self
            .sessions
            .get_session(request.session)?
            .ok_or(MarkFailure::SessionNotOpen)?;
        if !self.window_open(&session, now) {
            return Err(MarkFailure::SessionNotOpen);
        }

        if self
            .limiter
            .is_limited(identity, GuardedAction::MarkAttendance, now)
        {
            let retry_after_secs =
                self.limiter
                    .retry_after(identity, GuardedAction::MarkAttendance, now);
            return Err(MarkFailure::RateLimited { retry_after_secs });
        }

        let ctx = ThreatContext {
            session: Some(&session),
            similarity: None,
            distance_m: None,
            client_ip: request.client_ip,
        };

        if !self.enrollments.is_enrolled(identity, session.course)? {
            self.threats.record(
                identity,
                ThreatCategory::BruteForce,
                "unenrolled attendance attempt",
                &ctx,
                now,
            );
            return Err(MarkFailure::NotEnrolled);
        }

        // Voucher first, duplicate second: a replayed voucher is an attack
        // signal and must surface as such even when a record already
        // exists for the session.
        if let Err(err) = self
            .vouchers
            .redeem(request.voucher_token, identity, session.id, now)
        {
            return Err(match err {
                RedeemError::Rejected(rejection) => {
                    self.penalize_biometric(identity, now);
                    self.threats.record(
                        identity,
                        ThreatCategory::Replay,
                        rejection.to_string().as_str(),
                        &ctx,
                        now,
                    );
                    MarkFailure::InvalidVoucher(rejection)
                }
                RedeemError::Store(store) => MarkFailure::Store(store),
            });
        }

        if self.attendance.is_marked(identity, session.id)? {
            return Err(MarkFailure::AlreadyMarked);
        }

        if !self.biometric.is_enrolled(identity)? {
            return Err(MarkFailure::FaceNotRegistered);
        }

        let Ok(frame) = Frame::decode(request.image) else {
            // Input error: penalized like any failed capture, but carries
            // no threat points.
            self.penalize_biometric(identity, now);
            return Err(MarkFailure::BadImage);
        };

        let report = self.liveness.assess(&frame);
        if !report.live {
            self.penalize_biometric(identity, now);
            self.threats.record(
                identity,
                ThreatCategory::Spoofing,
                &report.reason_summary(),
                &ctx,
                now,
            );
            return Err(MarkFailure::LivenessFailed);
        }

        let MatchOutcome {
            matched,
            best_similarity,
        } = self.biometric.verify(&frame, &[identity])?;
        if matched.is_none() {
            self.penalize_biometric(identity, now);
            self.threats.record(
                identity,
                ThreatCategory::Impersonation,
                "face mismatch",
                &ThreatContext {
                    similarity: Some(best_similarity),
                    ..ctx
                },
                now,
            );
            return Err(MarkFailure::BiometricMismatch);
        }

        let on_trusted_network = self.allow_list.contains(request.client_ip);
        let decision = self.geofence.evaluate(
            &session.site,
            request.latitude,
            request.longitude,
            on_trusted_network,
        );
        if !decision.accepted {
            self.penalize_biometric(identity, now);
            self.threats.record(
                identity,
                ThreatCategory::LocationSpoof,
                "outside campus",
                &ThreatContext {
                    distance_m: Some(decision.distance_m),
                    ..ctx
                },
                now,
            );
            return Err(MarkFailure::OutsideCampus);
        }

        let record = AttendanceRecord {
            student: identity,
            session: session.id,
            marked_at: now,
            similarity: best_similarity,
            distance_m: decision.distance_m,
            client_ip: request.client_ip.to_string(),
            method: METHOD_TAG.to_string(),
        };
        if let Err(err) = self.attendance.insert_record(&record) {
            // A racing attempt with another voucher may have landed first.
            return Err(match err {
                StoreError::Duplicate(_) => MarkFailure::AlreadyMarked,
                other => MarkFailure::Store(other),
            });
        }

        tracing::info!(
            %identity,
            session = %session.id,
            similarity = best_similarity,
            distance_m = decision.distance_m,
            rule = decision.rule.map(|r| r.label()),
            "attendance marked"
        );
        Ok(MarkSuccess {
            similarity: best_similarity,
            distance_m: decision.distance_m,
        })
    }

    /// Marking is accepted from the session's start until its end plus a
    /// short grace period.
    fn window_open(&self, session: &SessionInfo, now: Timestamp) -> bool {
        if now < session.starts_at {
            return false;
        }
        !session.ends_at.plus(self.grace_secs).is_past(now)
    }

    /// A failed biometric-ish step counts against both the sliding rate
    /// window and the persistent biometric violation counter.
    fn penalize_biometric(&self, identity: StudentId, now: Timestamp) {
        self.limiter
            .register_attempt(identity, GuardedAction::MarkAttendance, now);
        if let Err(err) = self.lockout.register_biometric_violation(identity, now) {
            tracing::warn!(%identity, %err, "failed to record biometric violation");
        }
    }
}
