//! Declared tensor contracts.
//!
//! The inference model publishes the shape and element type of its input and
//! output tensors; both sides of the pipeline are driven by those
//! declarations. `FeatureLayout` maps the declared input shape onto one of
//! the axis orders the frontend knows how to produce. An unrecognized shape
//! is a hard failure, never a guessed default.

use serde::{Deserialize, Serialize};

use crate::error::{MurmurError, Result};

/// Element type of a model tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorType {
    Float32,
    Int32,
    Int64,
    Uint8,
    Int8,
}

impl TensorType {
    /// Width of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            Self::Float32 | Self::Int32 => 4,
            Self::Int64 => 8,
            Self::Uint8 | Self::Int8 => 1,
        }
    }
}

/// Shape and element type of one model tensor, as declared by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Declared dimensions, outermost first (batch dimension included).
    pub shape: Vec<i64>,
    pub dtype: TensorType,
}

impl TensorSpec {
    pub fn new(shape: Vec<i64>, dtype: TensorType) -> Self {
        Self { shape, dtype }
    }

    /// Total number of elements the declared shape holds.
    ///
    /// Non-positive dimensions contribute zero; shape validation happens in
    /// [`FeatureLayout::detect`], not here.
    pub fn element_count(&self) -> usize {
        self.shape
            .iter()
            .map(|&d| if d > 0 { d as usize } else { 0 })
            .product()
    }

    /// Total byte length of a buffer holding this tensor.
    pub fn byte_len(&self) -> usize {
        self.element_count() * self.dtype.element_size()
    }
}

/// Accepted axis orders for the flattened feature tensor.
///
/// Element (frame, mel) lands at flat index `mel·F + frame` for `MelMajor`
/// and `frame·M + mel` for the frame-major variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLayout {
    /// `[1, mel_bins, frames]`
    MelMajor,
    /// `[1, frames, mel_bins]`
    FrameMajor,
    /// `[1, 1, frames, mel_bins]`
    FrameMajorBatched,
}

impl FeatureLayout {
    /// Match a declared input spec against the supported layouts.
    ///
    /// Checked in declaration order, so a square `mel_bins == frames`
    /// configuration resolves to `MelMajor`.
    pub fn detect(spec: &TensorSpec, num_mel_bins: usize, num_frames: usize) -> Result<Self> {
        if spec.dtype != TensorType::Float32 {
            return Err(MurmurError::Config(format!(
                "input tensor must be float32, model declares {:?}",
                spec.dtype
            )));
        }
        if spec.shape.is_empty() || spec.shape.iter().any(|&d| d <= 0) {
            return Err(MurmurError::Config(format!(
                "input tensor shape {:?} has missing or non-positive dimensions",
                spec.shape
            )));
        }

        let mel = num_mel_bins as i64;
        let frames = num_frames as i64;
        match spec.shape.as_slice() {
            [1, m, f] if *m == mel && *f == frames => Ok(Self::MelMajor),
            [1, f, m] if *f == frames && *m == mel => Ok(Self::FrameMajor),
            [1, 1, f, m] if *f == frames && *m == mel => Ok(Self::FrameMajorBatched),
            _ => Err(MurmurError::UnsupportedLayout(spec.shape.clone())),
        }
    }
}
