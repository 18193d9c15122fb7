//! `CannedEngine` — placeholder backend returning a fixed output buffer.
//!
//! Stands in for a real runtime in tests, the golden pipeline test, and the
//! benchmark, while still enforcing both declared tensor contracts.

use tracing::debug;

use crate::error::{MurmurError, Result};
use crate::inference::InferenceEngine;
use crate::tensor::TensorSpec;

pub struct CannedEngine {
    input: TensorSpec,
    output: TensorSpec,
    canned: Vec<u8>,
}

impl CannedEngine {
    /// # Errors
    /// `Config` if the canned buffer does not match the declared output
    /// contract.
    pub fn new(input: TensorSpec, output: TensorSpec, canned: Vec<u8>) -> Result<Self> {
        if canned.len() != output.byte_len() {
            return Err(MurmurError::Config(format!(
                "canned output is {} bytes, declared output tensor needs {}",
                canned.len(),
                output.byte_len()
            )));
        }
        Ok(Self {
            input,
            output,
            canned,
        })
    }
}

impl InferenceEngine for CannedEngine {
    fn input_spec(&self) -> &TensorSpec {
        &self.input
    }

    fn output_spec(&self) -> &TensorSpec {
        &self.output
    }

    fn run(&self, features: &[u8]) -> Result<Vec<u8>> {
        if features.len() != self.input.byte_len() {
            return Err(MurmurError::Config(format!(
                "feature buffer is {} bytes, declared input tensor needs {}",
                features.len(),
                self.input.byte_len()
            )));
        }
        debug!(bytes = self.canned.len(), "CannedEngine::run");
        Ok(self.canned.clone())
    }
}
