//! Single-utterance transcription pipeline.
//!
//! Runs extract → infer → decode synchronously on the caller's thread. All
//! shared state (window, filterbank, vocabulary) is immutable, so a failed
//! utterance never affects the next one, and one `Transcriber` can serve
//! concurrent utterances behind an `Arc` without locking.

use std::time::Instant;

use tracing::debug;

use crate::decode::TokenDecoder;
use crate::error::Result;
use crate::frontend::FeatureExtractor;
use crate::inference::InferenceEngine;

pub struct Transcriber {
    extractor: FeatureExtractor,
    decoder: TokenDecoder,
}

impl Transcriber {
    pub fn new(extractor: FeatureExtractor, decoder: TokenDecoder) -> Self {
        Self { extractor, decoder }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn decoder(&self) -> &TokenDecoder {
        &self.decoder
    }

    /// Transcribe one complete utterance of little-endian PCM16 bytes.
    pub fn transcribe(&self, pcm: &[u8], engine: &dyn InferenceEngine) -> Result<String> {
        let started = Instant::now();
        let features = self.extractor.extract(pcm, engine.input_spec())?;
        let extracted_at = Instant::now();

        let raw = engine.run(&features)?;
        let inferred_at = Instant::now();

        let text = self.decoder.decode(&raw, engine.output_spec().dtype)?;
        debug!(
            extract_ms = extracted_at.duration_since(started).as_millis() as u64,
            infer_ms = inferred_at.duration_since(extracted_at).as_millis() as u64,
            decode_ms = inferred_at.elapsed().as_millis() as u64,
            text_len = text.len(),
            "utterance transcribed"
        );
        Ok(text)
    }
}
