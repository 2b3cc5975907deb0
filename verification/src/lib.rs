//! Attendance integrity verification pipeline.
//!
//! A marking attempt must prove three independent things at once: the
//! caller holds a short-lived single-use voucher, their live face matches
//! an enrolled template, and their device is physically near the
//! classroom. The orchestrator sequences the checks and short-circuits on
//! the first failure; every adversarial failure feeds the threat engine,
//! which converts repeated suspicious signals into time-bounded lockouts.
//!
//! The pipeline is a synchronous library: every operation is a bounded
//! sequence of checks safe to call from a pool of request workers. Frame
//! analysis is CPU-bound — callers should keep it off latency-sensitive
//! scheduling paths (a bounded worker pool is enough). The only hard
//! synchronization point is voucher redemption, which runs under the
//! store's row lock.

pub mod biometric;
pub mod config;
pub mod geofence;
pub mod limiter;
pub mod liveness;
pub mod lockout;
pub mod network;
pub mod orchestrator;
mod pixels;
pub mod threat;
pub mod voucher;

pub use biometric::{BiometricMatcher, EnrollError, MatchOutcome};
pub use config::{ConfigError, PipelineConfig};
pub use geofence::{AcceptanceRule, GeoDecision, GeofenceEvaluator};
pub use limiter::{GuardedAction, RateLimiter};
pub use liveness::{LivenessEvaluator, LivenessReport};
pub use lockout::LockoutEngine;
pub use network::{AllowListError, NetworkAllowList};
pub use orchestrator::{
    AttendancePipeline, IssueFailure, MarkFailure, MarkRequest, MarkSuccess, PipelineStores,
};
pub use threat::{ThreatCategory, ThreatContext, ThreatEngine};
pub use voucher::{RedeemError, VoucherError, VoucherRejection, VoucherService};
