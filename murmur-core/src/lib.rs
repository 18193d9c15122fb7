//! # murmur-core
//!
//! Speech-recognition frontend and decoder: PCM in, transcript out, with the
//! model inference call abstracted behind a trait.
//!
//! ## Architecture
//!
//! ```text
//! PCM16LE bytes → FeatureExtractor (+ MelFilterbank) → feature tensor bytes
//!                                                            │
//!                                                  InferenceEngine (external)
//!                                                            │
//!              transcript ← TokenDecoder (+ Vocabulary) ← raw output tensor
//! ```
//!
//! Every stage is a synchronous, pure computation over in-memory buffers.
//! The window, filterbank, and vocabulary are built once per configuration
//! and shared read-only across utterances; the feature tensor's byte layout
//! follows whichever axis order the model declares.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod decode;
pub mod error;
pub mod frontend;
pub mod inference;
pub mod pipeline;
pub mod tensor;

// Convenience re-exports for downstream crates
pub use decode::{TokenDecoder, Vocabulary};
pub use error::MurmurError;
pub use frontend::{FeatureConfig, FeatureExtractor, MelFilterbank};
pub use inference::{CannedEngine, InferenceEngine};
pub use pipeline::Transcriber;
pub use tensor::{FeatureLayout, TensorSpec, TensorType};
