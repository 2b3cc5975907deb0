//! Face embedding vector and the black-box extractor capability.
//!
//! The pipeline treats embedding extraction as an opaque capability with a
//! narrow contract: given a frame, it either produces a fixed-dimension
//! vector or nothing. Which model backs it is not the pipeline's concern;
//! tests use a deterministic stub.

use crate::Frame;
use serde::{Deserialize, Serialize};

/// A fixed-dimension face embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    pub fn l2_norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Scale to unit length. `None` if the vector has zero norm — a
    /// degenerate embedding carries no direction to compare against.
    pub fn normalized(&self) -> Option<Embedding> {
        let norm = self.l2_norm();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        Some(Embedding(self.0.iter().map(|v| v / norm).collect()))
    }

    /// Dot product; cosine similarity when both sides are unit vectors.
    ///
    /// # Panics
    /// Panics if dimensions differ — callers check `dim` first.
    pub fn dot(&self, other: &Embedding) -> f32 {
        assert_eq!(self.dim(), other.dim(), "embedding dimension mismatch");
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }

    /// Element-wise mean of several embeddings of equal dimension.
    ///
    /// Averaging several unit vectors and re-normalizing approximates a
    /// centroid direction, smoothing per-capture pose and lighting noise.
    /// Returns `None` on an empty input or mixed dimensions.
    pub fn mean_of(embeddings: &[Embedding]) -> Option<Embedding> {
        let first = embeddings.first()?;
        let dim = first.dim();
        if embeddings.iter().any(|e| e.dim() != dim) {
            return None;
        }
        let mut acc = vec![0.0f32; dim];
        for e in embeddings {
            for (slot, v) in acc.iter_mut().zip(&e.0) {
                *slot += v;
            }
        }
        let n = embeddings.len() as f32;
        Some(Embedding(acc.into_iter().map(|v| v / n).collect()))
    }
}

/// Black-box embedding extraction capability.
///
/// `None` means the extractor could not find a usable face in the frame;
/// the caller decides what that implies (enrollment skips the frame,
/// verification reports no match with similarity 0).
pub trait EmbeddingExtractor: Send + Sync {
    fn extract(&self, frame: &Frame) -> Option<Embedding>;
}
