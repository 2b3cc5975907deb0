//! Liveness evaluator — per-frame anti-spoof heuristic scorer.
//!
//! Five independent signals computed from pixel statistics of one still
//! frame, each adding a fixed suspicion weight when triggered. This is a
//! cheap, explainable gate meant to catch obvious photo/video/screen
//! replay, not a biometric-grade anti-spoof model: false negatives are
//! expected and acceptable — the goal is raising attacker cost.

use crate::pixels;
use rollcall_types::{Frame, PipelineParams};

/// The verdict plus every triggered signal, for audit and explainability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LivenessReport {
    pub live: bool,
    pub suspicion: u32,
    pub reasons: Vec<&'static str>,
}

impl LivenessReport {
    /// All triggered reasons, concatenated for logging.
    pub fn reason_summary(&self) -> String {
        self.reasons.join(", ")
    }
}

pub struct LivenessEvaluator {
    overexposure: f64,
    flatness: f64,
    texture_floor: f64,
    edge_ceiling: f64,
    noise_floor: f64,
    suspicion_threshold: u32,
}

impl LivenessEvaluator {
    pub fn new(params: &PipelineParams) -> Self {
        Self {
            overexposure: params.liveness_overexposure,
            flatness: params.liveness_flatness,
            texture_floor: params.liveness_texture_floor,
            edge_ceiling: params.liveness_edge_ceiling,
            noise_floor: params.liveness_noise_floor,
            suspicion_threshold: params.liveness_suspicion_threshold,
        }
    }

    pub fn assess(&self, frame: &Frame) -> LivenessReport {
        let mut suspicion = 0u32;
        let mut reasons = Vec::new();

        // Screens re-displayed to a camera wash out toward uniform white.
        let brightness = pixels::mean(frame);
        if brightness > self.overexposure {
            suspicion += 2;
            reasons.push("overexposed screen");
        }

        // Printed photos and defocused replays are flat.
        let focus = pixels::laplacian_variance(frame);
        if focus < self.flatness {
            suspicion += 2;
            reasons.push("flat surface detected");
        }

        // Real skin keeps micro-variation against its own blur.
        let texture = pixels::mean_abs_blur_diff(frame);
        if texture < self.texture_floor {
            suspicion += 2;
            reasons.push("low texture");
        }

        // Phone screens held to the camera contribute bezel edges.
        let edges = pixels::edge_ratio(frame);
        if edges > self.edge_ceiling {
            suspicion += 2;
            reasons.push("screen edges detected");
        }

        // Re-displayed digital images are too clean for a real sensor.
        let noise = pixels::stddev(frame);
        if noise < self.noise_floor {
            suspicion += 1;
            reasons.push("digital display suspected");
        }

        tracing::debug!(brightness, focus, texture, edges, noise, suspicion, "liveness signals");

        LivenessReport {
            live: suspicion < self.suspicion_threshold,
            suspicion,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> LivenessEvaluator {
        LivenessEvaluator::new(&PipelineParams::defaults())
    }

    fn uniform(value: u8) -> Frame {
        Frame::new(64, 64, vec![value; 4096]).unwrap()
    }

    fn live_capture() -> Frame {
        let mut seed = 0x9e37_79b9u32;
        let pixels: Vec<u8> = (0..4096)
            .map(|i| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let base = 90 + (i % 64) as i32;
                let noise = (seed >> 24) as i32 % 17 - 8;
                (base + noise).clamp(0, 255) as u8
            })
            .collect();
        Frame::new(64, 64, pixels).unwrap()
    }

    #[test]
    fn realistic_capture_passes() {
        let report = evaluator().assess(&live_capture());
        assert!(report.live, "triggered: {}", report.reason_summary());
        assert!(report.suspicion < 4);
    }

    #[test]
    fn blank_white_frame_reads_as_screen_replay() {
        let report = evaluator().assess(&uniform(255));
        assert!(!report.live);
        assert!(report.reasons.contains(&"overexposed screen"));
        assert!(report.reasons.contains(&"flat surface detected"));
        assert!(report.reasons.contains(&"low texture"));
        assert!(report.reasons.contains(&"digital display suspected"));
        assert_eq!(report.suspicion, 7);
    }

    #[test]
    fn mid_gray_frame_fails_on_flatness_alone() {
        // Not overexposed, but flat + textureless + noiseless crosses the line.
        let report = evaluator().assess(&uniform(128));
        assert!(!report.live);
        assert_eq!(report.suspicion, 5);
        assert!(!report.reasons.contains(&"overexposed screen"));
    }

    #[test]
    fn hard_stripes_trigger_the_edge_signal() {
        let pixels: Vec<u8> = (0..4096)
            .map(|i| if (i % 64) % 4 < 2 { 0 } else { 255 })
            .collect();
        let frame = Frame::new(64, 64, pixels).unwrap();
        let report = evaluator().assess(&frame);
        assert!(report.reasons.contains(&"screen edges detected"));
    }

    #[test]
    fn summary_concatenates_reasons() {
        let report = evaluator().assess(&uniform(255));
        let summary = report.reason_summary();
        assert!(summary.contains("overexposed screen"));
        assert!(summary.contains(", "));
    }
}
