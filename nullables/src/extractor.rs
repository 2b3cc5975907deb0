//! Nullable embedding extractor — deterministic stand-in for the model.

use rollcall_types::{Embedding, EmbeddingExtractor, Frame};

/// Dimension of the vectors the stub produces, matching the production
/// model's contract.
pub const STUB_DIM: usize = 512;

/// A deterministic extractor: the embedding is a function of the pixel
/// content only, so identical frames embed identically (cosine 1.0 after
/// normalization) while frames with different spatial structure diverge.
/// Luma is centered on the frame mean before striping, so overall
/// brightness carries no weight — only pattern shape does.
///
/// A featureless (uniform or all-zero) frame folds to the zero vector,
/// which exercises the degenerate-embedding paths downstream.
pub struct NullExtractor {
    reject_all: bool,
}

impl NullExtractor {
    pub fn new() -> Self {
        Self { reject_all: false }
    }

    /// An extractor that finds a face in nothing — for exercising the
    /// extraction-failure paths.
    pub fn rejecting() -> Self {
        Self { reject_all: true }
    }
}

impl Default for NullExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingExtractor for NullExtractor {
    fn extract(&self, frame: &Frame) -> Option<Embedding> {
        if self.reject_all {
            return None;
        }
        let sum: u64 = frame.pixels().iter().map(|&p| p as u64).sum();
        let mean = sum as f32 / frame.pixels().len() as f32;

        // Stripe-sum the centered luma plane into a fixed number of lanes.
        let mut lanes = vec![0.0f32; STUB_DIM];
        for (i, px) in frame.pixels().iter().enumerate() {
            lanes[i % STUB_DIM] += *px as f32 - mean;
        }
        Some(Embedding::new(lanes))
    }
}
