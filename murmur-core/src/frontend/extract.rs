//! PCM → model input tensor conversion.
//!
//! ## Pipeline parameters (must match the model's training frontend)
//!
//! | Parameter       | Default            |
//! |-----------------|--------------------|
//! | Sample rate     | 16 000 Hz          |
//! | Frame length    | 400 samples (25 ms)|
//! | Hop             | 160 samples (10 ms)|
//! | FFT size        | 400 (201 freq bins)|
//! | Mel bins        | 80                 |
//! | Frames          | 3 000 (30 s)       |
//!
//! ## Stages
//!
//! PCM16LE decode → Hann window per frame → FFT → power spectrum → mel
//! filterbank → natural log (floored) → mean/std normalization → pad or
//! truncate to the declared frame count → flatten in the declared layout.
//!
//! Extraction is a pure function of its inputs plus the shared immutable
//! window/filterbank/FFT plan; the output buffer is only allocated once the
//! whole feature matrix is computed. Truncation to the declared frame count
//! happens before the normalization statistics, so the result never depends
//! on discarded tail audio.

use std::sync::Arc;

use ndarray::{s, Array2};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::{debug, warn};

use crate::error::{MurmurError, Result};
use crate::frontend::mel::MelFilterbank;
use crate::tensor::{FeatureLayout, TensorSpec};

/// Additive floor under the natural log, keeping silent bins finite.
const LOG_FLOOR: f32 = 1e-10;
/// Epsilon added to the standard deviation during normalization.
const NORM_EPSILON: f64 = 1e-5;

/// Frontend configuration.
///
/// Defaults match the 16 kHz / 25 ms / 10 ms / 80-mel / 30 s contract of the
/// supported speech models.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    /// Analysis window length L in samples.
    pub frame_len: usize,
    /// Hop H between frame starts in samples.
    pub hop: usize,
    /// FFT size N; frames are zero-padded from L to N.
    pub fft_size: usize,
    /// Mel bin count M.
    pub num_mel_bins: usize,
    /// Declared frame count F the output is padded/truncated to.
    pub num_frames: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_len: 400,
            hop: 160,
            fft_size: 400,
            num_mel_bins: 80,
            num_frames: 3_000,
        }
    }
}

/// Converts one utterance of PCM bytes into the model's input tensor bytes.
///
/// Window, filterbank and FFT plan are built once at construction and shared
/// read-only across all subsequent extractions.
pub struct FeatureExtractor {
    config: FeatureConfig,
    window: Vec<f32>,
    filterbank: MelFilterbank,
    fft: Arc<dyn Fft<f32>>,
}

impl FeatureExtractor {
    /// # Errors
    /// `Config` if any dimension is zero, the hop is zero, or the FFT size is
    /// smaller than the frame length.
    pub fn new(config: FeatureConfig) -> Result<Self> {
        if config.frame_len == 0
            || config.hop == 0
            || config.num_mel_bins == 0
            || config.num_frames == 0
            || config.sample_rate == 0
        {
            return Err(MurmurError::Config(format!(
                "frontend dimensions must be positive: {config:?}"
            )));
        }
        if config.fft_size < config.frame_len {
            return Err(MurmurError::Config(format!(
                "fft_size {} is smaller than frame_len {}",
                config.fft_size, config.frame_len
            )));
        }

        let window = hann_window(config.frame_len);
        let filterbank =
            MelFilterbank::new(config.num_mel_bins, config.fft_size, config.sample_rate)?;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(config.fft_size);

        Ok(Self {
            config,
            window,
            filterbank,
            fft,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Convert little-endian PCM16 bytes into the flattened input tensor for
    /// `spec`.
    ///
    /// The returned buffer length always equals `spec.byte_len()`.
    ///
    /// # Errors
    /// - `Config`: non-float32 dtype or non-positive declared dimension.
    /// - `UnsupportedLayout`: declared shape is none of `[1,M,F]`, `[1,F,M]`,
    ///   `[1,1,F,M]`.
    /// - `InsufficientAudio`: fewer samples than one frame length.
    pub fn extract(&self, pcm: &[u8], spec: &TensorSpec) -> Result<Vec<u8>> {
        // Validate the declared contract before doing any DSP work.
        let layout =
            FeatureLayout::detect(spec, self.config.num_mel_bins, self.config.num_frames)?;

        let samples = pcm16le_to_f32(pcm);
        let features = self.log_mel_features(&samples)?;
        Ok(flatten(&features, layout, spec.byte_len()))
    }

    /// Normalized log-mel matrix, exactly `[num_frames][num_mel_bins]`.
    fn log_mel_features(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let frame_len = self.config.frame_len;
        let hop = self.config.hop;
        let fft_size = self.config.fft_size;
        let num_freq_bins = fft_size / 2 + 1;

        if samples.len() < frame_len {
            return Err(MurmurError::InsufficientAudio {
                got: samples.len(),
                need: frame_len,
            });
        }
        let total_frames = (samples.len() - frame_len) / hop + 1;
        let frames = total_frames.min(self.config.num_frames);
        if frames < total_frames {
            debug!(
                total_frames,
                kept = frames,
                "audio exceeds declared frame count; truncating"
            );
        }

        let mut mel = Array2::<f32>::zeros((self.config.num_frames, self.config.num_mel_bins));
        let mut fft_buf = vec![Complex::new(0.0f32, 0.0); fft_size];
        let mut power = vec![0.0f32; num_freq_bins];

        for frame in 0..frames {
            let start = frame * hop;

            for v in fft_buf.iter_mut() {
                *v = Complex::new(0.0, 0.0);
            }
            // The frame-count formula guarantees a full window; the min()
            // guards the short-tail case all the same.
            let available = (samples.len() - start).min(frame_len);
            for i in 0..available {
                fft_buf[i] = Complex::new(samples[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut fft_buf);

            // DC and Nyquist are pure real for real input; square the real
            // component alone.
            power[0] = fft_buf[0].re * fft_buf[0].re;
            for k in 1..num_freq_bins {
                power[k] = fft_buf[k].norm_sqr();
            }
            if fft_size % 2 == 0 {
                let nyquist = fft_buf[fft_size / 2].re;
                power[fft_size / 2] = nyquist * nyquist;
            }

            for (m, energy) in self.filterbank.apply(&power).into_iter().enumerate() {
                mel[[frame, m]] = (energy + LOG_FLOOR).ln();
            }
        }

        normalize_in_place(&mut mel, frames);
        Ok(mel)
    }
}

/// Decode little-endian PCM16 bytes into f32 samples in [-1, 1].
///
/// A dangling odd byte is dropped with a warning rather than failing the
/// utterance.
fn pcm16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    if bytes.len() % 2 != 0 {
        warn!(
            len = bytes.len(),
            "PCM byte count is odd; dropping the dangling byte"
        );
    }
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
        .collect()
}

/// Symmetric Hann window: `0.5·(1 − cos(2π·k/(L−1)))`.
fn hann_window(len: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|k| 0.5 * (1.0 - (2.0 * PI * k as f32 / (len - 1) as f32).cos()))
        .collect()
}

/// Normalize the first `frames` rows to zero mean and unit variance; rows
/// beyond `frames` stay 0.0 as padding.
fn normalize_in_place(mel: &mut Array2<f32>, frames: usize) {
    let active = mel.slice(s![..frames, ..]);
    let count = active.len() as f64;

    let mut sum = 0.0f64;
    for &v in active.iter() {
        sum += v as f64;
    }
    let mean = sum / count;

    let mut var_acc = 0.0f64;
    for &v in active.iter() {
        let d = v as f64 - mean;
        var_acc += d * d;
    }
    let std = (var_acc / count).sqrt();
    let denom = std + NORM_EPSILON;

    for v in mel.slice_mut(s![..frames, ..]).iter_mut() {
        *v = ((*v as f64 - mean) / denom) as f32;
    }
}

/// Flatten the `[F][M]` matrix into little-endian f32 bytes in `layout`
/// order.
fn flatten(features: &Array2<f32>, layout: FeatureLayout, byte_len: usize) -> Vec<u8> {
    let (num_frames, num_mel_bins) = features.dim();
    let mut out = Vec::with_capacity(byte_len);
    match layout {
        FeatureLayout::MelMajor => {
            for m in 0..num_mel_bins {
                for f in 0..num_frames {
                    out.extend_from_slice(&features[[f, m]].to_le_bytes());
                }
            }
        }
        // Array2 is row-major, so frame-major order is the natural one.
        FeatureLayout::FrameMajor | FeatureLayout::FrameMajorBatched => {
            for &v in features.iter() {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    debug_assert_eq!(out.len(), byte_len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorType;
    use approx::assert_relative_eq;

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            sample_rate: 16_000,
            frame_len: 400,
            hop: 160,
            fft_size: 400,
            num_mel_bins: 8,
            num_frames: 10,
        }
    }

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn sine_pcm(freq_hz: f32, num_samples: usize) -> Vec<u8> {
        use std::f32::consts::TAU;
        let samples: Vec<i16> = (0..num_samples)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                ((TAU * freq_hz * t).sin() * 0.5 * i16::MAX as f32) as i16
            })
            .collect();
        pcm_bytes(&samples)
    }

    fn frame_major_spec(config: &FeatureConfig) -> TensorSpec {
        TensorSpec::new(
            vec![1, config.num_frames as i64, config.num_mel_bins as i64],
            TensorType::Float32,
        )
    }

    fn decode_f32(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn hann_window_is_symmetric_and_zero_at_edges() {
        let w = hann_window(400);
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(w[399], 0.0, epsilon = 1e-4);
        for k in 0..200 {
            assert_relative_eq!(w[k], w[399 - k], epsilon = 1e-4);
        }
        // Symmetric form peaks at exactly 1.0 in the middle of an odd window.
        let odd = hann_window(401);
        assert_relative_eq!(odd[200], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn pcm_decoding_scales_to_unit_range() {
        let bytes = pcm_bytes(&[0, i16::MAX, i16::MIN, -16_384]);
        let samples = pcm16le_to_f32(&bytes);
        assert_eq!(samples.len(), 4);
        assert_relative_eq!(samples[0], 0.0);
        assert_relative_eq!(samples[1], 32_767.0 / 32_768.0);
        assert_relative_eq!(samples[2], -1.0);
        assert_relative_eq!(samples[3], -0.5);
    }

    #[test]
    fn odd_byte_count_drops_the_tail_byte() {
        let mut bytes = pcm_bytes(&[100, 200]);
        bytes.push(0x7f);
        assert_eq!(pcm16le_to_f32(&bytes).len(), 2);
    }

    #[test]
    fn zero_audio_yields_finite_tensor_of_declared_length() {
        let config = small_config();
        let spec = frame_major_spec(&config);
        let extractor = FeatureExtractor::new(config).expect("build extractor");

        let pcm = pcm_bytes(&vec![0i16; 1_600]);
        let out = extractor.extract(&pcm, &spec).expect("extract");
        assert_eq!(out.len(), spec.byte_len());
        for v in decode_f32(&out) {
            assert!(v.is_finite(), "non-finite feature value: {v}");
        }
    }

    #[test]
    fn audio_shorter_than_one_frame_is_rejected() {
        let config = small_config();
        let spec = frame_major_spec(&config);
        let extractor = FeatureExtractor::new(config).expect("build extractor");

        let pcm = pcm_bytes(&vec![0i16; 399]);
        let err = extractor.extract(&pcm, &spec).unwrap_err();
        assert!(matches!(
            err,
            MurmurError::InsufficientAudio { got: 399, need: 400 }
        ));
    }

    #[test]
    fn short_audio_pads_with_zero_rows() {
        let config = small_config();
        let spec = frame_major_spec(&config);
        let num_mel_bins = config.num_mel_bins;
        let extractor = FeatureExtractor::new(config).expect("build extractor");

        // 720 samples → 3 frames of the declared 10.
        let out = extractor
            .extract(&sine_pcm(440.0, 720), &spec)
            .expect("extract");
        let values = decode_f32(&out);
        for (i, v) in values.iter().enumerate().skip(3 * num_mel_bins) {
            assert_eq!(*v, 0.0, "padding row entry {i} was {v}");
        }
        // The real frames are normalized, not all-zero.
        assert!(values[..3 * num_mel_bins].iter().any(|v| *v != 0.0));
    }

    #[test]
    fn long_audio_is_truncated_independent_of_tail() {
        let config = small_config();
        let spec = frame_major_spec(&config);
        let extractor = FeatureExtractor::new(config).expect("build extractor");

        // 10 frames need 400 + 9·160 = 1840 samples.
        let exact = sine_pcm(440.0, 1_840);
        let mut longer = sine_pcm(440.0, 1_840);
        longer.extend_from_slice(&sine_pcm(3_000.0, 4_000));

        let a = extractor.extract(&exact, &spec).expect("extract exact");
        let b = extractor.extract(&longer, &spec).expect("extract longer");
        assert_eq!(a, b, "truncated output depends on discarded tail");
    }

    #[test]
    fn extraction_is_deterministic() {
        let config = small_config();
        let spec = frame_major_spec(&config);
        let extractor = FeatureExtractor::new(config).expect("build extractor");

        let pcm = sine_pcm(440.0, 3_200);
        let a = extractor.extract(&pcm, &spec).expect("extract");
        let b = extractor.extract(&pcm, &spec).expect("extract");
        assert_eq!(a, b);
    }

    #[test]
    fn normalized_features_have_zero_mean_unit_std() {
        let config = small_config();
        let num_mel_bins = config.num_mel_bins;
        let spec = frame_major_spec(&config);
        let extractor = FeatureExtractor::new(config).expect("build extractor");

        // Exactly 10 frames, so no padding dilutes the statistics.
        let out = extractor
            .extract(&sine_pcm(440.0, 1_840), &spec)
            .expect("extract");
        let values = decode_f32(&out);
        assert_eq!(values.len(), 10 * num_mel_bins);

        let mean: f64 = values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64;
        let var: f64 = values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / values.len() as f64;
        assert!(mean.abs() < 1e-4, "mean={mean}");
        assert!((var.sqrt() - 1.0).abs() < 1e-2, "std={}", var.sqrt());
    }

    #[test]
    fn mel_major_layout_transposes_the_matrix() {
        let config = small_config();
        let frame_spec = frame_major_spec(&config);
        let mel_spec = TensorSpec::new(
            vec![1, config.num_mel_bins as i64, config.num_frames as i64],
            TensorType::Float32,
        );
        let batched_spec = TensorSpec::new(
            vec![1, 1, config.num_frames as i64, config.num_mel_bins as i64],
            TensorType::Float32,
        );
        let (num_frames, num_mel_bins) = (config.num_frames, config.num_mel_bins);
        let extractor = FeatureExtractor::new(config).expect("build extractor");
        let pcm = sine_pcm(440.0, 1_840);

        let by_frame = decode_f32(&extractor.extract(&pcm, &frame_spec).expect("frame-major"));
        let by_mel = decode_f32(&extractor.extract(&pcm, &mel_spec).expect("mel-major"));
        let batched = decode_f32(&extractor.extract(&pcm, &batched_spec).expect("batched"));

        assert_eq!(by_frame, batched);
        for f in 0..num_frames {
            for m in 0..num_mel_bins {
                assert_eq!(by_frame[f * num_mel_bins + m], by_mel[m * num_frames + f]);
            }
        }
    }

    #[test]
    fn unsupported_shape_fails_before_any_dsp() {
        let config = small_config();
        let extractor = FeatureExtractor::new(config).expect("build extractor");

        let spec = TensorSpec::new(vec![1, 7, 9], TensorType::Float32);
        // Even an empty buffer reaches the layout check first.
        let err = extractor.extract(&[], &spec).unwrap_err();
        assert!(matches!(err, MurmurError::UnsupportedLayout(_)));
    }

    #[test]
    fn invalid_frontend_config_is_rejected() {
        let mut config = small_config();
        config.hop = 0;
        assert!(FeatureExtractor::new(config).is_err());

        let mut config = small_config();
        config.fft_size = 256; // smaller than frame_len 400
        assert!(FeatureExtractor::new(config).is_err());
    }
}
