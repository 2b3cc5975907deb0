//! Pipeline parameters — every tunable constant in one place.
//!
//! The liveness thresholds and threat weights are empirically chosen
//! values carried over from production tuning; they are configuration
//! constants, not derived quantities.

use serde::{Deserialize, Serialize};

/// All tunable parameters of the attendance pipeline.
///
/// Deserializes with per-field defaults, so a config file only needs to
/// name the values it overrides.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    // ── Vouchers ─────────────────────────────────────────────────────────
    /// Validity window of an attendance voucher, in seconds.
    pub voucher_validity_secs: u64,

    // ── Rate limiting ────────────────────────────────────────────────────
    /// Failed attempts allowed per identity+action inside the window.
    pub attempt_limit: usize,

    /// Trailing window for the attempt counter, in seconds.
    pub attempt_window_secs: u64,

    /// Tracked (identity, action) keys above which the whole attempt map
    /// is dropped — bounds memory under hostile traffic.
    pub attempt_key_cap: usize,

    // ── Geofence ─────────────────────────────────────────────────────────
    /// Fallback acceptance radius for devices with coarse (IP-derived)
    /// geolocation only, in meters.
    pub coarse_radius_m: f64,

    // ── Enrollment quality gate ──────────────────────────────────────────
    /// Capture frames required per enrollment request.
    pub enroll_min_frames: usize,

    /// Frames that must survive the quality gate and produce embeddings.
    pub enroll_min_survivors: usize,

    /// Minimum Laplacian variance; below this the frame is motion-blurred.
    pub quality_min_sharpness: f64,

    /// Minimum mean brightness; below this the frame is too dark to use.
    pub quality_min_brightness: f64,

    // ── Biometric match ──────────────────────────────────────────────────
    /// Cosine similarity a candidate must reach to count as a match.
    pub face_min_similarity: f32,

    // ── Liveness heuristics ──────────────────────────────────────────────
    /// Mean brightness above which the frame reads as an overexposed screen.
    pub liveness_overexposure: f64,

    /// Laplacian variance below which the frame reads as a flat print.
    pub liveness_flatness: f64,

    /// Mean |frame − blurred frame| below which skin micro-texture is absent.
    pub liveness_texture_floor: f64,

    /// Hard-edge pixel ratio above which screen bezels are suspected.
    pub liveness_edge_ceiling: f64,

    /// Pixel standard deviation below which sensor noise is implausibly low.
    pub liveness_noise_floor: f64,

    /// Accumulated suspicion at which the frame is declared not live.
    pub liveness_suspicion_threshold: u32,

    // ── Threat accumulation ──────────────────────────────────────────────
    /// Rolling window over which threat points accumulate, in seconds.
    pub threat_window_secs: u64,

    /// Windowed score at which an alert fires.
    pub threat_alert_threshold: u32,

    /// Per-(identity, category) cooldown between alerts, in seconds.
    pub threat_alert_cooldown_secs: u64,

    /// Tracked identities above which the whole ledger is dropped.
    pub threat_identity_cap: usize,

    /// Point weights per event category.
    pub weight_impersonation: u32,
    pub weight_location_spoof: u32,
    pub weight_spoofing: u32,
    pub weight_brute_force: u32,
    pub weight_replay: u32,

    // ── Lockout ──────────────────────────────────────────────────────────
    /// Failed credential checks before the credential lock engages.
    pub credential_lock_threshold: u32,

    /// Credential lock window, in seconds.
    pub credential_lock_secs: u64,

    /// Biometric violations before the biometric lock engages.
    pub biometric_lock_threshold: u32,

    /// Biometric lock window, in seconds.
    pub biometric_lock_secs: u64,

    // ── Sessions ─────────────────────────────────────────────────────────
    /// Grace period after a session's end time during which marking is
    /// still accepted, in seconds.
    pub session_grace_secs: u64,
}

impl PipelineParams {
    /// Production defaults.
    pub fn defaults() -> Self {
        Self {
            voucher_validity_secs: 120,

            attempt_limit: 3,
            attempt_window_secs: 60,
            attempt_key_cap: 1000,

            coarse_radius_m: 3000.0,

            enroll_min_frames: 3,
            enroll_min_survivors: 2,
            quality_min_sharpness: 5.0,
            quality_min_brightness: 30.0,

            face_min_similarity: 0.7,

            liveness_overexposure: 240.0,
            liveness_flatness: 8.0,
            liveness_texture_floor: 1.2,
            liveness_edge_ceiling: 0.38,
            liveness_noise_floor: 4.0,
            liveness_suspicion_threshold: 4,

            threat_window_secs: 300,
            threat_alert_threshold: 5,
            threat_alert_cooldown_secs: 600,
            threat_identity_cap: 500,

            weight_impersonation: 1,
            weight_location_spoof: 2,
            weight_spoofing: 3,
            weight_brute_force: 2,
            weight_replay: 3,

            credential_lock_threshold: 8,
            credential_lock_secs: 15 * 60,

            biometric_lock_threshold: 3,
            biometric_lock_secs: 10 * 60,

            session_grace_secs: 30,
        }
    }
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self::defaults()
    }
}
