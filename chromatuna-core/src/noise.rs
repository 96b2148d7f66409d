//! # Noise Suppressor
//!
//! Clears everything below the lowest playable note, then gates each octave
//! band against its own RMS level. Noise energy is far from flat across the
//! spectrum, so a single global threshold would either erase quiet high
//! partials or keep the low-frequency noise floor.

use crate::fft::MagnitudeSpectrum;

/// Bins below this frequency are zeroed unconditionally (mains hum, rumble).
pub const SUB_AUDIO_CUTOFF_HZ: f32 = 16.0;

/// Per-band adaptive gate over a magnitude spectrum.
#[derive(Debug, Clone)]
pub struct NoiseSuppressor {
    bin_width: f32,
    octave_bands: Vec<f32>,
    white_noise_ratio: f32,
}

impl NoiseSuppressor {
    pub fn new(bin_width: f32, octave_bands: Vec<f32>, white_noise_ratio: f32) -> Self {
        Self {
            bin_width,
            octave_bands,
            white_noise_ratio,
        }
    }

    /// Returns a gated copy of `spectrum`.
    pub fn suppress(&self, spectrum: &[f32]) -> MagnitudeSpectrum {
        let mut gated = spectrum.to_vec();
        self.zero_sub_audio(&mut gated);
        self.gate_octave_bands(&mut gated);
        gated
    }

    fn bin_index(&self, frequency: f32) -> usize {
        (frequency / self.bin_width) as usize
    }

    fn zero_sub_audio(&self, spectrum: &mut [f32]) {
        let end = self.bin_index(SUB_AUDIO_CUTOFF_HZ).min(spectrum.len());
        spectrum[..end].fill(0.0);
    }

    fn gate_octave_bands(&self, spectrum: &mut [f32]) {
        for band in self.octave_bands.windows(2) {
            let start = self.bin_index(band[0]);
            let end = self.bin_index(band[1]).min(spectrum.len());
            if start >= end {
                continue;
            }

            let bins = &mut spectrum[start..end];
            let band_rms = (bins.iter().map(|&m| m * m).sum::<f32>() / bins.len() as f32).sqrt();
            let threshold = self.white_noise_ratio * band_rms;
            for magnitude in bins.iter_mut() {
                if *magnitude <= threshold {
                    *magnitude = 0.0;
                }
            }
        }
    }
}
