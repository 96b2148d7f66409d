//! # Error Types
//!
//! Only construction-time configuration faults and fatal capture faults cross
//! the engine boundary. Weak signal, degenerate spectra and per-block stream
//! faults are handled inside the pipeline and never show up here.

use thiserror::Error;

/// A rejected [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("window size must be positive")]
    ZeroWindowSize,

    #[error("step size must be positive")]
    ZeroStepSize,

    #[error("window size {window} is smaller than step size {step}")]
    WindowSmallerThanStep { window: usize, step: usize },

    #[error("harmonic count must be at least 1")]
    ZeroHarmonicCount,

    #[error("reference pitch must be a positive finite frequency, got {0}")]
    InvalidReferencePitch(f32),

    #[error("power threshold must be finite and non-negative, got {0}")]
    InvalidPowerThreshold(f32),

    #[error("white noise ratio must be finite and non-negative, got {0}")]
    InvalidWhiteNoiseRatio(f32),

    #[error("octave band edge {index} ({value} Hz) is not a finite non-negative frequency")]
    InvalidBandEdge { index: usize, value: f32 },

    #[error("octave band edges must be strictly increasing ({previous} Hz followed by {next} Hz)")]
    BandEdgesNotIncreasing { previous: f32, next: f32 },

    #[error("expected 12 note names, got {0}")]
    NoteNameCount(usize),

    #[error("note name at position {0} is empty")]
    EmptyNoteName(usize),

    #[error("note history size must be at least 1")]
    ZeroHistorySize,

    #[error("supervisor poll interval must be at least 1 ms")]
    ZeroPollInterval,
}

/// Fatal faults of the audio capture subsystem.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("Failed to enumerate devices: {0}")]
    DeviceQuery(String),

    #[error("No suitable f32 input format found at {0} Hz")]
    NoSupportedFormat(u32),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start stream: {0}")]
    StreamPlay(String),

    #[error("Thread error: {0}")]
    Thread(String),

    #[error("Capture worker exited before the stream was opened")]
    WorkerGone,
}

/// Errors surfaced by [`PitchEngine`](crate::engine::PitchEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("audio capture failed: {0}")]
    Capture(#[from] CaptureError),
}
