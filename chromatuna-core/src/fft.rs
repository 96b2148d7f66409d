//! # Spectral Analyzer
//!
//! Turns a full sliding window into a magnitude spectrum for the rest of the
//! pipeline. It handles the power gate, Hann windowing and the forward FFT.
//!
//! The Hann coefficients and the FFT plan are computed once per window size
//! and reused for every block, keeping the per-block cost at one FFT.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Nyquist-truncated magnitudes; bin `i` sits at `i * sample_rate / window_size` Hz.
pub type MagnitudeSpectrum = Vec<f32>;

/// Outcome of analyzing one window.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// Power fell below the activation threshold; nothing was transformed.
    BelowThreshold { power: f32 },
    Spectrum { power: f32, magnitudes: MagnitudeSpectrum },
}

/// Mean signal power: squared L2 norm divided by the length.
pub fn signal_power(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32
}

/// Symmetric Hann window of length `n`: `0.5 * (1 - cos(2*pi*k / (n - 1)))`.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Windowed FFT front end for a fixed window size.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    power_threshold: f32,
}

impl SpectralAnalyzer {
    pub fn new(window_size: usize, power_threshold: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];

        Self {
            fft,
            hann: hann_window(window_size),
            buffer: vec![Complex::default(); window_size],
            scratch,
            power_threshold,
        }
    }

    pub fn window_size(&self) -> usize {
        self.hann.len()
    }

    /// Gates on signal power, then computes the magnitude spectrum.
    ///
    /// # Panics
    /// * If `window` is not exactly the configured window size
    pub fn analyze(&mut self, window: &[f32]) -> Analysis {
        let power = signal_power(window);
        if power < self.power_threshold {
            return Analysis::BelowThreshold { power };
        }
        Analysis::Spectrum {
            power,
            magnitudes: self.magnitude_spectrum(window),
        }
    }

    /// Hann-windowed FFT magnitudes, first half only.
    ///
    /// # Panics
    /// * If `window` is not exactly the configured window size
    pub fn magnitude_spectrum(&mut self, window: &[f32]) -> MagnitudeSpectrum {
        assert_eq!(
            window.len(),
            self.window_size(),
            "input window must match the analyzer window size"
        );

        for ((slot, &sample), &coefficient) in self.buffer.iter_mut().zip(window).zip(&self.hann) {
            *slot = Complex {
                re: sample * coefficient,
                im: 0.0,
            };
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // Real input: the upper half mirrors the lower half.
        self.buffer
            .iter()
            .take(self.window_size() / 2)
            .map(|c| c.norm())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn hann_window_matches_reference_formula() {
        let window = hann_window(5);
        let expected = [0.0, 0.5, 1.0, 0.5, 0.0];
        for (got, want) in window.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} != {want}");
        }
    }

    #[test]
    fn signal_power_is_mean_square() {
        assert_eq!(signal_power(&[]), 0.0);
        assert_eq!(signal_power(&[1.0, -1.0, 1.0, -1.0]), 1.0);
        assert_eq!(signal_power(&[2.0, 0.0]), 2.0);
    }

    #[test]
    fn silence_is_gated_before_the_transform() {
        let mut analyzer = SpectralAnalyzer::new(1024, 1e-5);
        let analysis = analyzer.analyze(&vec![0.0; 1024]);
        assert_eq!(analysis, Analysis::BelowThreshold { power: 0.0 });
    }

    #[test]
    fn spectrum_has_half_length_and_peaks_at_tone_bin() {
        let sample_rate = 8000.0;
        let size = 1000;
        let freq = 440.0;
        let signal: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let mut analyzer = SpectralAnalyzer::new(size, 1e-5);
        let Analysis::Spectrum { power, magnitudes } = analyzer.analyze(&signal) else {
            panic!("a full-scale sine must pass the power gate");
        };

        assert!((power - 0.5).abs() < 0.01);
        assert_eq!(magnitudes.len(), size / 2);
        assert!(magnitudes.iter().all(|&m| m >= 0.0));

        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let bin_width = sample_rate / size as f32;
        assert_eq!(peak, (freq / bin_width).round() as usize);
    }
}
