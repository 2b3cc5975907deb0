//! Security alert storage trait.

use crate::StoreError;
use rollcall_types::{SessionId, StudentId, Timestamp};
use serde::{Deserialize, Serialize};

/// A persisted escalation, written when an identity's windowed threat
/// score crosses the alert threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityAlert {
    pub identity: StudentId,
    pub event: String,
    pub details: String,
    pub threat_score: u32,
    /// Attack evidence, when the triggering step produced it.
    pub similarity: Option<f32>,
    pub distance_m: Option<f64>,
    pub session: Option<SessionId>,
    pub course_name: Option<String>,
    pub client_ip: String,
    pub raised_at: Timestamp,
    /// Cleared by an admin action outside the pipeline.
    pub resolved: bool,
}

/// Trait for alert persistence. Writes here are audit-path: a failure is
/// logged by the caller and never aborts the triggering decision.
pub trait AlertStore: Send + Sync {
    fn insert_alert(&self, alert: &SecurityAlert) -> Result<(), StoreError>;
}
