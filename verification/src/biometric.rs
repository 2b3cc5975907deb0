//! Biometric matcher — enrollment and encrypted-template comparison.
//!
//! Enrollment averages several quality-gated captures into a centroid
//! direction and stores it only in encrypted form. Verification compares
//! one probe embedding against each candidate's decrypted template by
//! cosine similarity. A failure in one candidate (bad ciphertext, stale
//! dimension) is isolated: it logs an anomaly and skips that candidate,
//! never aborting the evaluation of the others.

use crate::pixels;
use rollcall_crypto::{CryptoError, TemplateCipher};
use rollcall_store::{EncryptedTemplate, StoreError, TemplateStore};
use rollcall_types::{Embedding, EmbeddingExtractor, Frame, PipelineParams, StudentId, Timestamp};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrollError {
    #[error("need at least {needed} capture frames, got {got}")]
    NotEnoughFrames { needed: usize, got: usize },

    #[error("only {passed} frames passed the quality gate, need {needed}")]
    InsufficientQuality { passed: usize, needed: usize },

    #[error("averaged embedding has zero norm")]
    DegenerateEmbedding,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The best candidate found, if any, plus the best similarity achieved —
/// reported even on a miss so callers can distinguish "close but not
/// enough" from "no signal at all".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchOutcome {
    pub matched: Option<StudentId>,
    pub best_similarity: f32,
}

impl MatchOutcome {
    fn none() -> Self {
        Self {
            matched: None,
            best_similarity: 0.0,
        }
    }
}

pub struct BiometricMatcher {
    extractor: Arc<dyn EmbeddingExtractor>,
    templates: Arc<dyn TemplateStore>,
    cipher: Arc<TemplateCipher>,
    min_similarity: f32,
    min_sharpness: f64,
    min_brightness: f64,
    min_frames: usize,
    min_survivors: usize,
}

impl BiometricMatcher {
    pub fn new(
        extractor: Arc<dyn EmbeddingExtractor>,
        templates: Arc<dyn TemplateStore>,
        cipher: Arc<TemplateCipher>,
        params: &PipelineParams,
    ) -> Self {
        Self {
            extractor,
            templates,
            cipher,
            min_similarity: params.face_min_similarity,
            min_sharpness: params.quality_min_sharpness,
            min_brightness: params.quality_min_brightness,
            min_frames: params.enroll_min_frames,
            min_survivors: params.enroll_min_survivors,
        }
    }

    /// Motion-blurred and too-dark frames never reach the extractor.
    fn passes_quality_gate(&self, frame: &Frame) -> bool {
        pixels::laplacian_variance(frame) >= self.min_sharpness
            && pixels::mean(frame) >= self.min_brightness
    }

    /// Enroll (or wholesale re-enroll) an identity's template.
    ///
    /// A single capture is noisy in pose and lighting; averaging several
    /// unit vectors and re-normalizing approximates a centroid direction,
    /// which cuts false rejects without a learned aggregator.
    pub fn enroll(
        &self,
        owner: StudentId,
        frames: &[Frame],
        now: Timestamp,
    ) -> Result<(), EnrollError> {
        if frames.len() < self.min_frames {
            return Err(EnrollError::NotEnoughFrames {
                needed: self.min_frames,
                got: frames.len(),
            });
        }

        let embeddings: Vec<Embedding> = frames
            .iter()
            .filter(|frame| self.passes_quality_gate(frame))
            .filter_map(|frame| self.extractor.extract(frame))
            .collect();

        if embeddings.len() < self.min_survivors {
            return Err(EnrollError::InsufficientQuality {
                passed: embeddings.len(),
                needed: self.min_survivors,
            });
        }

        let centroid = Embedding::mean_of(&embeddings).ok_or(EnrollError::DegenerateEmbedding)?;
        let normalized = centroid.normalized().ok_or(EnrollError::DegenerateEmbedding)?;

        let ciphertext = self.cipher.encrypt_vector(normalized.as_slice())?;
        self.templates.put_template(&EncryptedTemplate {
            owner,
            ciphertext,
            updated_at: now,
        })?;
        tracing::info!(%owner, samples = embeddings.len(), "biometric template enrolled");
        Ok(())
    }

    /// Whether the identity has any registered template.
    pub fn is_enrolled(&self, owner: StudentId) -> Result<bool, StoreError> {
        self.templates.has_template(owner)
    }

    /// Match one probe frame against the candidate identities.
    ///
    /// Extraction failure (no usable face) yields no match, similarity 0.
    pub fn verify(
        &self,
        frame: &Frame,
        candidates: &[StudentId],
    ) -> Result<MatchOutcome, StoreError> {
        let Some(probe) = self.extractor.extract(frame) else {
            return Ok(MatchOutcome::none());
        };
        let Some(probe) = probe.normalized() else {
            return Ok(MatchOutcome::none());
        };

        let mut matched = None;
        let mut best_similarity = 0.0f32;
        for &candidate in candidates {
            let Some(template) = self.templates.get_template(candidate)? else {
                continue;
            };
            let stored = match self.cipher.decrypt_vector(&template.ciphertext) {
                Ok(vector) => Embedding::new(vector),
                Err(err) => {
                    tracing::warn!(%candidate, %err, "template decryption failed; skipping candidate");
                    continue;
                }
            };
            if stored.dim() != probe.dim() {
                tracing::warn!(
                    %candidate,
                    stored_dim = stored.dim(),
                    probe_dim = probe.dim(),
                    "template dimension mismatch; skipping candidate"
                );
                continue;
            }
            let Some(stored) = stored.normalized() else {
                continue;
            };

            let similarity = probe.dot(&stored);
            if similarity > best_similarity {
                best_similarity = similarity;
                matched = Some(candidate);
            }
        }

        if best_similarity >= self.min_similarity {
            Ok(MatchOutcome {
                matched,
                best_similarity,
            })
        } else {
            tracing::debug!(best_similarity, "face verification below threshold");
            Ok(MatchOutcome {
                matched: None,
                best_similarity,
            })
        }
    }
}
