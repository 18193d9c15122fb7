//! Raw output tensor → transcript decoding.
//!
//! ## State machine
//!
//! 1. Extract an ordered id sequence from the output buffer. Integer outputs
//!    are read element by element; float outputs are per-timestep logit rows
//!    reduced by greedy argmax (ties toward the lowest index, `NaN` never
//!    selected).
//! 2. Walk the ids: the first end-of-text sentinel terminates decoding,
//!    control markers are skipped, word-boundary glyphs become spaces, and
//!    everything else is appended verbatim.
//!
//! Greedy selection over logits is deliberate: the supported models were
//! exported for argmax decoding, not beam search.
//!
//! Malformed input never panics; every failure mode is an explicit error
//! value, and a failed decode leaves the shared vocabulary untouched.

pub mod vocab;

pub use vocab::Vocabulary;

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{MurmurError, Result};
use crate::tensor::TensorType;

/// Canonical end-of-text marker scanned for in the vocabulary.
pub const EOT_MARKER: &str = "<|endoftext|>";

/// Glyph prefixing tokens that start a new word.
pub const WORD_BOUNDARY_GLYPH: char = '\u{0120}'; // Ġ

/// Ids an output tensor can legitimately carry. int64 values beyond this
/// range are kept intact (surfacing as `[UNK:…]` placeholders) instead of
/// aliasing a real token through a truncating cast.
const ID_RANGE: std::ops::RangeInclusive<i64> = 0..=u32::MAX as i64;

/// Converts one raw output tensor into a transcript string.
pub struct TokenDecoder {
    vocab: Arc<Vocabulary>,
    eot_id: Option<i64>,
}

impl TokenDecoder {
    /// The end-of-text id is located once here and reused for every decode.
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        let eot_id = vocab.id_of(EOT_MARKER);
        if eot_id.is_none() {
            warn!("vocabulary has no {EOT_MARKER} entry; decoding cannot terminate early");
        }
        Self { vocab, eot_id }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Decode a raw output buffer of the declared element type.
    ///
    /// # Errors
    /// `Decode` when the vocabulary is empty, the buffer length is not a
    /// multiple of the element width, or the element type is not one of
    /// int32/int64/float32.
    pub fn decode(&self, raw: &[u8], dtype: TensorType) -> Result<String> {
        if self.vocab.is_empty() {
            return Err(MurmurError::Decode("vocabulary is empty".into()));
        }

        let ids = match dtype {
            TensorType::Int32 => {
                check_aligned(raw.len(), 4)?;
                raw.chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
                    .collect()
            }
            TensorType::Int64 => {
                check_aligned(raw.len(), 8)?;
                raw.chunks_exact(8)
                    .map(|b| {
                        let id =
                            i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
                        if !ID_RANGE.contains(&id) {
                            debug!(id, "output id outside the representable token range");
                        }
                        id
                    })
                    .collect()
            }
            TensorType::Float32 => {
                check_aligned(raw.len(), 4)?;
                self.argmax_ids(raw)
            }
            other => {
                return Err(MurmurError::Decode(format!(
                    "unsupported output element type: {other:?}"
                )))
            }
        };

        Ok(self.render(&ids))
    }

    /// Greedy per-timestep selection over `vocab.len()`-wide logit rows.
    fn argmax_ids(&self, raw: &[u8]) -> Vec<i64> {
        let vocab_size = self.vocab.len();
        let num_floats = raw.len() / 4;
        let steps = num_floats / vocab_size;
        if num_floats % vocab_size != 0 {
            warn!(
                num_floats,
                vocab_size,
                steps,
                "logit count is not a multiple of the vocabulary size; \
                 decoding complete timesteps only"
            );
        }

        let mut ids = Vec::with_capacity(steps);
        for step in 0..steps {
            let base = step * vocab_size * 4;
            let mut best: Option<(usize, f32)> = None;
            for i in 0..vocab_size {
                let offset = base + i * 4;
                let v = f32::from_le_bytes([
                    raw[offset],
                    raw[offset + 1],
                    raw[offset + 2],
                    raw[offset + 3],
                ]);
                if v.is_nan() {
                    continue;
                }
                match best {
                    Some((_, b)) if b >= v => {}
                    _ => best = Some((i, v)),
                }
            }
            match best {
                Some((i, _)) => ids.push(i as i64),
                None => debug!(step, "timestep holds only NaN logits; skipping"),
            }
        }
        ids
    }

    /// Detokenize an id sequence into the final trimmed transcript.
    fn render(&self, ids: &[i64]) -> String {
        let mut out = String::new();
        for &id in ids {
            if Some(id) == self.eot_id {
                break;
            }
            let Some(token) = self.vocab.get(id) else {
                let _ = write!(out, "[UNK:{id}]");
                continue;
            };
            if is_control_marker(token) {
                continue;
            }
            match token.strip_prefix(WORD_BOUNDARY_GLYPH) {
                Some(rest) => {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    out.push_str(rest);
                }
                None => out.push_str(token),
            }
        }
        out.trim().to_string()
    }
}

fn check_aligned(len: usize, width: usize) -> Result<()> {
    if len % width != 0 {
        return Err(MurmurError::Decode(format!(
            "output buffer length {len} is not a multiple of element width {width}"
        )));
    }
    Ok(())
}

/// Control/special markers (transcription control, language tags,
/// timestamps) all share the `<|…|>` form.
fn is_control_marker(token: &str) -> bool {
    token.len() >= 4 && token.starts_with("<|") && token.ends_with("|>")
}
