//! PCM → feature tensor frontend.

pub mod extract;
pub mod mel;

pub use extract::{FeatureConfig, FeatureExtractor};
pub use mel::MelFilterbank;
