//! Fundamental types for the Rollcall attendance pipeline.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: identities, timestamps, camera frames, face embeddings, and
//! the pipeline parameters.

pub mod embedding;
pub mod frame;
pub mod id;
pub mod params;
pub mod time;

pub use embedding::{Embedding, EmbeddingExtractor};
pub use frame::{Frame, FrameError};
pub use id::{CourseId, SessionId, StudentId};
pub use params::PipelineParams;
pub use time::Timestamp;
