//! # Harmonic Estimator
//!
//! Estimates the fundamental frequency of a gated magnitude spectrum with a
//! Harmonic Product Spectrum (HPS).
//!
//! ## Steps
//! 1. Linear interpolation onto a grid `H` times denser than the bins
//! 2. L2 normalization so successive products stay comparable
//! 3. `H` rounds of multiplying the accumulator with `k`-strided copies of
//!    the interpolated spectrum, which reinforces the index where the
//!    fundamental and its harmonics line up
//! 4. Peak picking and conversion back to Hz

/// HPS based fundamental estimator.
#[derive(Debug, Clone)]
pub struct HarmonicEstimator {
    bin_width: f32,
    harmonic_count: usize,
}

impl HarmonicEstimator {
    /// # Arguments
    /// * `bin_width` - Width of one spectrum bin in Hz
    /// * `harmonic_count` - Interpolation factor and number of HPS rounds (at least 1)
    pub fn new(bin_width: f32, harmonic_count: usize) -> Self {
        Self {
            bin_width,
            harmonic_count: harmonic_count.max(1),
        }
    }

    /// Estimates the fundamental frequency in Hz.
    ///
    /// # Returns
    /// * `Some(frequency)` - The HPS peak converted to Hz
    /// * `None` - The spectrum carries no energy, or the peak landed on DC
    pub fn estimate(&self, spectrum: &[f32]) -> Option<f32> {
        let interpolated = interpolate(spectrum, self.harmonic_count);
        let normalized = normalize(&interpolated)?;
        let hps = harmonic_product_spectrum(&normalized, self.harmonic_count);

        match peak_index(&hps) {
            Some(index) if index > 0 => {
                Some(index as f32 * self.bin_width / self.harmonic_count as f32)
            }
            _ => None,
        }
    }
}

/// Resamples `spectrum` at `1 / factor` bin steps by linear interpolation.
///
/// Positions past the last bin repeat the last value.
pub fn interpolate(spectrum: &[f32], factor: usize) -> Vec<f32> {
    let n = spectrum.len();
    if n == 0 || factor == 0 {
        return Vec::new();
    }

    (0..n * factor)
        .map(|j| {
            let base = j / factor;
            if base + 1 >= n {
                return spectrum[n - 1];
            }
            let frac = (j % factor) as f32 / factor as f32;
            spectrum[base] + (spectrum[base + 1] - spectrum[base]) * frac
        })
        .collect()
}

/// Divides by the Euclidean norm. `None` when the norm is zero or not finite.
pub fn normalize(spectrum: &[f32]) -> Option<Vec<f32>> {
    let norm = spectrum.iter().map(|&m| m * m).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(spectrum.iter().map(|&m| m / norm).collect())
}

/// Multiplies `spectrum` with its `k`-strided copies for `k = 1..=rounds`.
///
/// The accumulator shrinks to the strided length each round. A round whose
/// product is entirely zero ends the loop and the previous accumulator is
/// returned unchanged, even though it is longer than later rounds would be.
pub fn harmonic_product_spectrum(spectrum: &[f32], rounds: usize) -> Vec<f32> {
    let mut hps = spectrum.to_vec();

    for k in 1..=rounds {
        let strided_len = spectrum.len().div_ceil(k);
        let product: Vec<f32> = hps
            .iter()
            .take(strided_len)
            .zip(spectrum.iter().step_by(k))
            .map(|(acc, m)| acc * m)
            .collect();

        if product.iter().all(|&v| v == 0.0) {
            break;
        }
        hps = product;
    }

    hps
}

/// Index of the first maximum.
fn peak_index(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
