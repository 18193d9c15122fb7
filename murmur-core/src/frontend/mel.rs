//! Triangular mel filterbank construction.
//!
//! ## Algorithm
//!
//! 1. Convert 0 Hz and Nyquist to the mel scale: `mel = 2595·log10(1 + hz/700)`.
//! 2. Place M+2 points linearly in mel space, convert each back to Hz and map
//!    to the nearest FFT bin `round(hz·N/Sr)`, clamped to `[0, N/2]`.
//! 3. Filter m spans bins (start, center, end) = (bin[m], bin[m+1], bin[m+2]):
//!    rising edge `(k−start)/(center−start)`, falling edge
//!    `1 − (k−center)/(end−center)`.
//!
//! At low mel resolution adjacent points can collapse onto the same FFT bin.
//! A degenerate half (zero-width slope) assigns weight 1.0 at the shared bin
//! and skips the slope entirely, so no division by zero ever happens.
//!
//! The matrix is built once per (M, N, Sr) configuration and shared read-only
//! across every frame of every utterance.

use tracing::debug;

use crate::error::{MurmurError, Result};

/// Immutable M×(N/2+1) matrix of triangular filter weights.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// One row of `num_freq_bins` weights per mel bin.
    weights: Vec<Vec<f32>>,
    num_mel_bins: usize,
    num_freq_bins: usize,
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

impl MelFilterbank {
    /// Build the filterbank for `num_mel_bins` filters over an FFT of
    /// `fft_size` points at `sample_rate` Hz.
    ///
    /// # Errors
    /// `Config` if any dimension is zero.
    pub fn new(num_mel_bins: usize, fft_size: usize, sample_rate: u32) -> Result<Self> {
        if num_mel_bins == 0 || fft_size == 0 || sample_rate == 0 {
            return Err(MurmurError::Config(format!(
                "mel filterbank dimensions must be positive \
                 (mel_bins={num_mel_bins}, fft_size={fft_size}, sample_rate={sample_rate})"
            )));
        }

        let num_freq_bins = fft_size / 2 + 1;
        let max_bin = fft_size / 2;
        let mel_max = hz_to_mel(sample_rate as f32 / 2.0);

        // M+2 boundary bins, non-decreasing because mel→hz is monotone.
        let bins: Vec<usize> = (0..num_mel_bins + 2)
            .map(|i| {
                let mel = mel_max * i as f32 / (num_mel_bins + 1) as f32;
                let hz = mel_to_hz(mel);
                let bin = (hz * fft_size as f32 / sample_rate as f32).round() as usize;
                bin.min(max_bin)
            })
            .collect();

        let mut weights = vec![vec![0.0f32; num_freq_bins]; num_mel_bins];
        for (m, row) in weights.iter_mut().enumerate() {
            let start = bins[m];
            let center = bins[m + 1];
            let end = bins[m + 2];

            if start == center {
                row[center] = 1.0;
            } else {
                for k in start..center {
                    row[k] = (k - start) as f32 / (center - start) as f32;
                }
            }
            if center == end {
                row[center] = 1.0;
            } else {
                for k in center..end {
                    row[k] = 1.0 - (k - center) as f32 / (end - center) as f32;
                }
            }
        }

        debug!(num_mel_bins, fft_size, sample_rate, "built mel filterbank");
        Ok(Self {
            weights,
            num_mel_bins,
            num_freq_bins,
        })
    }

    pub fn num_mel_bins(&self) -> usize {
        self.num_mel_bins
    }

    pub fn num_freq_bins(&self) -> usize {
        self.num_freq_bins
    }

    /// Iterate the filter rows, one `num_freq_bins` slice per mel bin.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.weights.iter().map(|row| row.as_slice())
    }

    /// Multiply one frame's power vector through the filterbank.
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        debug_assert_eq!(power.len(), self.num_freq_bins);
        self.weights
            .iter()
            .map(|row| row.iter().zip(power).map(|(w, p)| w * p).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_filter_peaks_at_its_center_bin() {
        let (mel_bins, fft_size, sample_rate) = (80usize, 400usize, 16_000u32);
        let fb = MelFilterbank::new(mel_bins, fft_size, sample_rate).expect("build filterbank");

        let mel_max = hz_to_mel(sample_rate as f32 / 2.0);
        for (m, row) in fb.rows().enumerate() {
            let mel = mel_max * (m + 1) as f32 / (mel_bins + 1) as f32;
            let center = ((mel_to_hz(mel) * fft_size as f32 / sample_rate as f32).round()
                as usize)
                .min(fft_size / 2);
            assert!(
                (row[center] - 1.0).abs() < 1e-6,
                "filter {m} weight at center bin {center} is {}",
                row[center]
            );
        }
    }

    #[test]
    fn degenerate_filters_still_peak_at_one() {
        // 60 filters over a 64-point FFT forces adjacent mel points onto the
        // same bin, so most triangles have at least one zero-width half.
        let fb = MelFilterbank::new(60, 64, 16_000).expect("build filterbank");
        for (m, row) in fb.rows().enumerate() {
            let peak = row.iter().copied().fold(0.0f32, f32::max);
            assert!(
                (peak - 1.0).abs() < 1e-6,
                "filter {m} never attains 1.0 (peak={peak})"
            );
            assert!(row.iter().all(|w| w.is_finite()), "filter {m} not finite");
        }
    }

    #[test]
    fn weights_are_non_negative_and_bounded() {
        let fb = MelFilterbank::new(40, 512, 16_000).expect("build filterbank");
        for row in fb.rows() {
            assert_eq!(row.len(), 512 / 2 + 1);
            for &w in row {
                assert!((0.0..=1.0).contains(&w), "weight out of range: {w}");
            }
        }
    }

    #[test]
    fn apply_projects_power_onto_mel_bins() {
        let fb = MelFilterbank::new(8, 64, 16_000).expect("build filterbank");
        // Flat unit power: each mel energy equals the row's weight sum.
        let power = vec![1.0f32; fb.num_freq_bins()];
        let energies = fb.apply(&power);
        assert_eq!(energies.len(), 8);
        for (energy, row) in energies.iter().zip(fb.rows()) {
            let expected: f32 = row.iter().sum();
            assert!((energy - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(MelFilterbank::new(0, 400, 16_000).is_err());
        assert!(MelFilterbank::new(80, 0, 16_000).is_err());
        assert!(MelFilterbank::new(80, 400, 0).is_err());
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0f32, 125.0, 1_000.0, 4_000.0, 8_000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 0.5, "hz={hz} round-tripped to {back}");
        }
    }
}
