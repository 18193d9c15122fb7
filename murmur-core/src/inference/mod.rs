//! Inference backend abstraction.
//!
//! The `InferenceEngine` trait decouples the frontend and decoder from any
//! specific runtime. The engine owns its declared tensor contracts: the
//! input spec drives the frontend's layout selection, the output spec drives
//! the decoder's type dispatch. `run` is an opaque mapping from one feature
//! tensor to one raw output tensor.

pub mod stub;

pub use stub::CannedEngine;

use crate::error::Result;
use crate::tensor::TensorSpec;

/// Contract for inference backends.
pub trait InferenceEngine: Send {
    /// Declared input tensor (float32, 3–4 dims, batch dimension 1).
    fn input_spec(&self) -> &TensorSpec;

    /// Declared output tensor (int32, int64, or float32 logits).
    fn output_spec(&self) -> &TensorSpec;

    /// Map one feature tensor to one raw output tensor.
    ///
    /// # Errors
    /// Implementation-defined; a failed run must leave the engine usable for
    /// the next utterance.
    fn run(&self, features: &[u8]) -> Result<Vec<u8>>;
}
