//! # Engine Configuration
//!
//! [`EngineConfig`] is built once, validated by
//! [`PitchEngine::new`](crate::engine::PitchEngine::new) and never mutated
//! afterwards. The defaults reproduce the reference tuner: a one second
//! analysis window at 48 kHz advanced in quarter-second steps.
//!
//! Every field has a default, so a JSON document only needs the keys it
//! wants to override.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample rate used by the reference tuner, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
/// DFT window length in samples.
pub const DEFAULT_WINDOW_SIZE: usize = 48_000;
/// Samples consumed per capture callback.
pub const DEFAULT_STEP_SIZE: usize = 12_000;
/// Number of harmonic product spectrum iterations.
pub const DEFAULT_HARMONIC_COUNT: usize = 5;
/// Tuning is only attempted once the window power exceeds this.
pub const DEFAULT_POWER_THRESHOLD: f32 = 1e-5;
/// Everything at or below this fraction of the band RMS is cut off.
pub const DEFAULT_WHITE_NOISE_RATIO: f32 = 0.2;
/// Concert pitch of A4.
pub const DEFAULT_REFERENCE_PITCH: f32 = 440.0;
/// Octave band edges in Hz used by the adaptive noise gate.
pub const DEFAULT_OCTAVE_BANDS: [f32; 10] = [
    50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0, 12800.0, 25600.0,
];
/// The 12 chromatic note names, starting at the reference note.
pub const DEFAULT_NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];
/// Number of consecutive identical notes before a detection counts as settled.
pub const DEFAULT_HISTORY_SIZE: usize = 2;
/// How often the supervisor checks the running flag.
pub const DEFAULT_SUPERVISOR_POLL_MS: u64 = 300;

/// Immutable parameters of the pitch detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Sliding window length in samples.
    pub window_size: usize,
    /// Block size delivered per capture callback.
    pub step_size: usize,
    /// Harmonic count `H` for the harmonic product spectrum.
    pub harmonic_count: usize,
    pub power_threshold: f32,
    pub white_noise_ratio: f32,
    /// Frequency of the reference note (A4) in Hz.
    pub reference_pitch: f32,
    pub octave_bands: Vec<f32>,
    pub note_names: Vec<String>,
    pub history_size: usize,
    pub supervisor_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_size: DEFAULT_WINDOW_SIZE,
            step_size: DEFAULT_STEP_SIZE,
            harmonic_count: DEFAULT_HARMONIC_COUNT,
            power_threshold: DEFAULT_POWER_THRESHOLD,
            white_noise_ratio: DEFAULT_WHITE_NOISE_RATIO,
            reference_pitch: DEFAULT_REFERENCE_PITCH,
            octave_bands: DEFAULT_OCTAVE_BANDS.to_vec(),
            note_names: DEFAULT_NOTE_NAMES.iter().map(|n| n.to_string()).collect(),
            history_size: DEFAULT_HISTORY_SIZE,
            supervisor_poll_ms: DEFAULT_SUPERVISOR_POLL_MS,
        }
    }
}

impl EngineConfig {
    /// Checks every construction-time invariant, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindowSize);
        }
        if self.step_size == 0 {
            return Err(ConfigError::ZeroStepSize);
        }
        if self.window_size < self.step_size {
            return Err(ConfigError::WindowSmallerThanStep {
                window: self.window_size,
                step: self.step_size,
            });
        }
        if self.harmonic_count == 0 {
            return Err(ConfigError::ZeroHarmonicCount);
        }
        if !self.reference_pitch.is_finite() || self.reference_pitch <= 0.0 {
            return Err(ConfigError::InvalidReferencePitch(self.reference_pitch));
        }
        if !self.power_threshold.is_finite() || self.power_threshold < 0.0 {
            return Err(ConfigError::InvalidPowerThreshold(self.power_threshold));
        }
        if !self.white_noise_ratio.is_finite() || self.white_noise_ratio < 0.0 {
            return Err(ConfigError::InvalidWhiteNoiseRatio(self.white_noise_ratio));
        }
        for (index, &value) in self.octave_bands.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidBandEdge { index, value });
            }
        }
        for pair in self.octave_bands.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ConfigError::BandEdgesNotIncreasing {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        if self.note_names.len() != 12 {
            return Err(ConfigError::NoteNameCount(self.note_names.len()));
        }
        if let Some(position) = self.note_names.iter().position(|n| n.is_empty()) {
            return Err(ConfigError::EmptyNoteName(position));
        }
        if self.history_size == 0 {
            return Err(ConfigError::ZeroHistorySize);
        }
        if self.supervisor_poll_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Width of one spectrum bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.window_size as f32
    }

    /// Wall-clock time covered by one capture block.
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.step_size as f64 / self.sample_rate as f64)
    }

    pub fn supervisor_poll_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_poll_ms)
    }
}
