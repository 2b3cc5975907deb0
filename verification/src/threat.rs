//! Threat accumulation and escalation engine.
//!
//! Every adversarial failure in the pipeline lands here as weighted
//! points in a per-identity rolling window. Crossing the alert threshold
//! persists a security alert, notifies a human, and escalates the
//! biometric lockout counter — then clears the identity's ledger, so a
//! fresh run of violations is required to alert again. The ledger is
//! process-local and recreatable: losing it on restart degrades to "no
//! recent history", never to an unsafe accept.

use crate::lockout::LockoutEngine;
use rollcall_notify::Notifier;
use rollcall_store::{AlertStore, SecurityAlert, SessionInfo};
use rollcall_types::{PipelineParams, StudentId, Timestamp};
use rollcall_utils::format_duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const ALERT_SUBJECT: &str = "Rollcall security alert";
const ALERT_EVENT: &str = "Repeated suspicious attendance activity";

/// Event categories with fixed point weights. A single severe event
/// (replay, spoofing) reaches the alert threshold faster than repeated
/// low-severity ones; isolated low-severity events never do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreatCategory {
    Impersonation,
    LocationSpoof,
    Spoofing,
    BruteForce,
    Replay,
}

impl ThreatCategory {
    pub fn label(self) -> &'static str {
        match self {
            ThreatCategory::Impersonation => "face impersonation attempt",
            ThreatCategory::LocationSpoof => "location spoof attempt",
            ThreatCategory::Spoofing => "spoofing attempt (photo/video)",
            ThreatCategory::BruteForce => "brute force attempt",
            ThreatCategory::Replay => "replay attack attempt",
        }
    }

    pub fn weight(self, params: &PipelineParams) -> u32 {
        match self {
            ThreatCategory::Impersonation => params.weight_impersonation,
            ThreatCategory::LocationSpoof => params.weight_location_spoof,
            ThreatCategory::Spoofing => params.weight_spoofing,
            ThreatCategory::BruteForce => params.weight_brute_force,
            ThreatCategory::Replay => params.weight_replay,
        }
    }
}

/// Evidence accompanying a threat event, threaded into the alert.
#[derive(Clone, Copy, Debug)]
pub struct ThreatContext<'a> {
    pub session: Option<&'a SessionInfo>,
    pub similarity: Option<f32>,
    pub distance_m: Option<f64>,
    pub client_ip: &'a str,
}

impl<'a> ThreatContext<'a> {
    pub fn new(client_ip: &'a str) -> Self {
        Self {
            session: None,
            similarity: None,
            distance_m: None,
            client_ip,
        }
    }
}

struct LedgerEntry {
    at: Timestamp,
    points: u32,
}

pub struct ThreatEngine {
    params: PipelineParams,
    ledgers: Mutex<HashMap<StudentId, Vec<LedgerEntry>>>,
    last_alert: Mutex<HashMap<(StudentId, ThreatCategory), Timestamp>>,
    alerts: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    lockout: Arc<LockoutEngine>,
}

impl ThreatEngine {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
        lockout: Arc<LockoutEngine>,
        params: &PipelineParams,
    ) -> Self {
        Self {
            params: params.clone(),
            ledgers: Mutex::new(HashMap::new()),
            last_alert: Mutex::new(HashMap::new()),
            alerts,
            notifier,
            lockout,
        }
    }

    /// Record a suspicious event. Returns the identity's windowed score
    /// after the event (0 again if an alert fired and cleared it).
    pub fn record(
        &self,
        identity: StudentId,
        category: ThreatCategory,
        detail: &str,
        ctx: &ThreatContext<'_>,
        now: Timestamp,
    ) -> u32 {
        let points = category.weight(&self.params);

        let total = {
            let mut ledgers = self.ledgers.lock().unwrap();
            if ledgers.len() > self.params.threat_identity_cap {
                tracing::warn!(
                    tracked = ledgers.len(),
                    "threat ledger over capacity; dropping all history"
                );
                ledgers.clear();
            }
            let ledger = ledgers.entry(identity).or_default();
            ledger.retain(|e| now.seconds_since(e.at) < self.params.threat_window_secs);
            ledger.push(LedgerEntry { at: now, points });
            ledger.iter().map(|e| e.points).sum::<u32>()
        };
        tracing::debug!(%identity, label = category.label(), points, total, "threat recorded");

        if total >= self.params.threat_alert_threshold && self.claim_alert_slot(identity, category, now)
        {
            self.escalate(identity, category, detail, ctx, total, now);
            return 0;
        }
        total
    }

    /// One alert per (identity, category) per cooldown. Claiming the slot
    /// under the mutex also decides the winner when workers race.
    fn claim_alert_slot(
        &self,
        identity: StudentId,
        category: ThreatCategory,
        now: Timestamp,
    ) -> bool {
        let mut last_alert = self.last_alert.lock().unwrap();
        let key = (identity, category);
        let clear = last_alert
            .get(&key)
            .is_none_or(|prev| now.seconds_since(*prev) > self.params.threat_alert_cooldown_secs);
        if clear {
            last_alert.insert(key, now);
        }
        clear
    }

    fn escalate(
        &self,
        identity: StudentId,
        category: ThreatCategory,
        detail: &str,
        ctx: &ThreatContext<'_>,
        total: u32,
        now: Timestamp,
    ) {
        // The alert itself resets the window.
        self.ledgers.lock().unwrap().remove(&identity);

        let alert = SecurityAlert {
            identity,
            event: ALERT_EVENT.to_string(),
            details: format!("threat score {total} | cause: {} | {detail}", category.label()),
            threat_score: total,
            similarity: ctx.similarity,
            distance_m: ctx.distance_m,
            session: ctx.session.map(|s| s.id),
            course_name: ctx.session.map(|s| s.course_name.clone()),
            client_ip: ctx.client_ip.to_string(),
            raised_at: now,
            resolved: false,
        };

        // Audit path: a failed write must not abort the caller's decision.
        if let Err(err) = self.alerts.insert_alert(&alert) {
            tracing::warn!(%identity, %err, "failed to persist security alert");
        }

        self.notifier.deliver(ALERT_SUBJECT, &self.alert_body(&alert));

        match self.lockout.register_biometric_violation(identity, now) {
            Ok(true) => tracing::info!(%identity, "threat escalation engaged the biometric lock"),
            Ok(false) => {}
            Err(err) => tracing::warn!(%identity, %err, "failed to escalate lockout counter"),
        }

        tracing::warn!(%identity, total, label = category.label(), "security alert raised");
    }

    fn alert_body(&self, alert: &SecurityAlert) -> String {
        let mut body = format!(
            "Identity: {}\nEvent: {}\nDetails: {}\nThreat score: {} (window {})\n",
            alert.identity,
            alert.event,
            alert.details,
            alert.threat_score,
            format_duration(self.params.threat_window_secs),
        );
        if let Some(similarity) = alert.similarity {
            body.push_str(&format!("Similarity: {similarity:.3}\n"));
        }
        if let Some(distance_m) = alert.distance_m {
            body.push_str(&format!("Distance from campus: {distance_m:.1} m\n"));
        }
        if let Some(course) = &alert.course_name {
            body.push_str(&format!("Course: {course}\n"));
        }
        if let Some(session) = alert.session {
            body.push_str(&format!("Session: {session}\n"));
        }
        body.push_str(&format!(
            "Client IP: {}\nTimestamp: {}\n",
            alert.client_ip, alert.raised_at
        ));
        body
    }
}
