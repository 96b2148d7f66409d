// chromatuna-core/src/lib.rs

//! The core logic for the chromatic string tuner.
//! This crate is responsible for audio capture, spectral analysis, pitch
//! detection and note classification. It is completely headless
//! and contains no display code.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod fft;
pub mod guided;
pub mod noise;
pub mod pipeline;
pub mod pitch;
pub mod stability;
pub mod tuning;
pub mod window;

pub use config::EngineConfig;
pub use engine::{EngineState, PitchEngine};
pub use error::{CaptureError, ConfigError, EngineError};

/// Represents the result of a single processed audio block.
///
/// Blocks rejected by the power gate (or yielding no usable peak) produce the
/// sentinel from [`DetectionResult::no_signal`]: empty note, all values zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    /// Nearest note name with octave, e.g. "E2".
    pub note: String,
    /// Estimated fundamental in Hz, rounded to 0.1.
    pub frequency: f32,
    /// Equal-tempered pitch of `note` in Hz, rounded to 0.1.
    pub target_pitch: f32,
    /// `frequency - target_pitch`.
    pub difference: f32,
}

impl DetectionResult {
    pub fn new(note: String, frequency: f32, target_pitch: f32) -> Self {
        let frequency = round_to_tenth(frequency);
        let target_pitch = round_to_tenth(target_pitch);
        Self {
            note,
            frequency,
            target_pitch,
            difference: round_to_tenth(frequency - target_pitch),
        }
    }

    /// The "no signal" sentinel.
    pub fn no_signal() -> Self {
        Self::default()
    }

    pub fn is_signal(&self) -> bool {
        !self.note.is_empty()
    }

    /// Deviation from the target pitch in cents; `None` for the sentinel.
    pub fn cents_deviation(&self) -> Option<f32> {
        if !self.is_signal() || self.target_pitch <= 0.0 || self.frequency <= 0.0 {
            return None;
        }
        Some(tuning::calculate_cents_deviation(self.frequency, self.target_pitch))
    }
}

fn round_to_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Consumer of detection events. Runs on the capture thread, so
/// implementations must return quickly.
pub trait DetectionSink: Send + Sync {
    /// Called once for every processed or rejected block, in arrival order.
    fn on_detection(&self, result: &DetectionResult);

    /// Called just before `on_detection` when the recent notes agree.
    fn on_settled(&self, _result: &DetectionResult) {}
}

impl<F> DetectionSink for F
where
    F: Fn(&DetectionResult) + Send + Sync,
{
    fn on_detection(&self, result: &DetectionResult) {
        self(result)
    }
}
