//! # Detection Pipeline
//!
//! One audio block in, one detection out:
//! window shift → power gate → spectrum → noise gate → HPS → note → debounce.
//!
//! The pipeline owns every piece of per-stream state (sliding window, note
//! history) and is driven by exactly one caller at a time. Each stage hands a
//! fresh value to the next one.

use crate::{
    config::EngineConfig,
    fft::{Analysis, SpectralAnalyzer},
    noise::NoiseSuppressor,
    pitch::HarmonicEstimator,
    stability::StabilityFilter,
    tuning::NoteMapper,
    window::SlidingWindow,
    DetectionResult,
};
use log::{debug, info, warn};

/// Why a block produced the "no signal" sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Every sample in the block was exactly zero; the window was left as is.
    EmptyBlock,
    /// The block length did not match the configured step size.
    WrongBlockSize { expected: usize, actual: usize },
    /// Window power below the activation threshold.
    WeakSignal { power: f32 },
    /// Nothing survived the noise gate, or the HPS peak sat at DC.
    NoPeak,
}

/// What one block produced.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Rejected(Rejection),
    Detected {
        result: DetectionResult,
        /// The last few blocks all mapped to the same note.
        settled: bool,
    },
}

impl BlockOutcome {
    /// The value handed to consumers: the detection, or the sentinel.
    pub fn result(&self) -> DetectionResult {
        match self {
            BlockOutcome::Detected { result, .. } => result.clone(),
            BlockOutcome::Rejected(_) => DetectionResult::no_signal(),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, BlockOutcome::Detected { settled: true, .. })
    }
}

/// The per-block pitch detection pipeline.
pub struct DetectionPipeline {
    step_size: usize,
    window: SlidingWindow,
    analyzer: SpectralAnalyzer,
    suppressor: NoiseSuppressor,
    estimator: HarmonicEstimator,
    mapper: NoteMapper,
    stability: StabilityFilter,
}

impl DetectionPipeline {
    /// Builds a pipeline with a zero-filled window and an empty note history.
    ///
    /// `config` is expected to have passed [`EngineConfig::validate`].
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            step_size: config.step_size,
            window: SlidingWindow::new(config.window_size),
            analyzer: SpectralAnalyzer::new(config.window_size, config.power_threshold),
            suppressor: NoiseSuppressor::new(
                config.bin_width(),
                config.octave_bands.clone(),
                config.white_noise_ratio,
            ),
            estimator: HarmonicEstimator::new(config.bin_width(), config.harmonic_count),
            mapper: NoteMapper::new(config.reference_pitch, config.note_names.clone()),
            stability: StabilityFilter::new(config.history_size),
        }
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Runs one block through every stage.
    pub fn process(&mut self, block: &[f32]) -> BlockOutcome {
        if block.len() != self.step_size {
            warn!(
                "[PIPELINE] Dropping block of {} samples, expected {}",
                block.len(),
                self.step_size
            );
            return BlockOutcome::Rejected(Rejection::WrongBlockSize {
                expected: self.step_size,
                actual: block.len(),
            });
        }
        if block.iter().all(|&s| s == 0.0) {
            return BlockOutcome::Rejected(Rejection::EmptyBlock);
        }

        self.window.push(block);

        let (power, magnitudes) = match self.analyzer.analyze(self.window.samples()) {
            Analysis::BelowThreshold { power } => {
                debug!("[PIPELINE] Signal is too weak: power {power:e}");
                return BlockOutcome::Rejected(Rejection::WeakSignal { power });
            }
            Analysis::Spectrum { power, magnitudes } => (power, magnitudes),
        };

        let gated = self.suppressor.suppress(&magnitudes);
        let Some(frequency) = self.estimator.estimate(&gated) else {
            debug!("[PIPELINE] No spectral peak after noise suppression");
            return BlockOutcome::Rejected(Rejection::NoPeak);
        };

        let note = self.mapper.map_to_note(frequency);
        let result = DetectionResult::new(note.label, frequency, note.frequency);
        let settled = self.stability.observe(&result.note);

        if settled {
            info!(
                "[PIPELINE] Closest note: {} {:.1}/{:.1} (power {power:e})",
                result.note, result.frequency, result.target_pitch
            );
        }

        BlockOutcome::Detected { result, settled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn small_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 8000,
            window_size: 8000,
            step_size: 2000,
            ..Default::default()
        }
    }

    /// Harmonic-rich tone, continuous across blocks.
    fn tone_block(freq: f32, sample_rate: u32, offset: usize, len: usize) -> Vec<f32> {
        const AMPS: [f32; 6] = [0.8, 0.6, 0.4, 0.3, 0.2, 0.1];
        (offset..offset + len)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                AMPS.iter()
                    .enumerate()
                    .map(|(h, a)| a * (2.0 * PI * freq * (h + 1) as f32 * t).sin())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn all_zero_block_is_rejected_without_touching_window() {
        let config = small_config();
        let mut pipeline = DetectionPipeline::new(&config);
        pipeline.process(&tone_block(110.0, 8000, 0, 2000));
        let before = pipeline.window().samples().to_vec();

        let outcome = pipeline.process(&vec![0.0; 2000]);
        assert_eq!(outcome, BlockOutcome::Rejected(Rejection::EmptyBlock));
        assert_eq!(outcome.result(), DetectionResult::no_signal());
        assert_eq!(pipeline.window().samples(), &before[..]);
    }

    #[test]
    fn quiet_block_fails_power_gate() {
        let mut pipeline = DetectionPipeline::new(&small_config());
        let outcome = pipeline.process(&vec![1e-4; 2000]);
        assert!(matches!(outcome, BlockOutcome::Rejected(Rejection::WeakSignal { .. })));
        assert!(!outcome.result().is_signal());
    }

    #[test]
    fn wrong_block_size_is_dropped() {
        let mut pipeline = DetectionPipeline::new(&small_config());
        let outcome = pipeline.process(&[0.5; 100]);
        assert_eq!(
            outcome,
            BlockOutcome::Rejected(Rejection::WrongBlockSize { expected: 2000, actual: 100 })
        );
        assert!(pipeline.window().samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn window_tail_equals_last_block() {
        let mut pipeline = DetectionPipeline::new(&small_config());
        let block = tone_block(196.0, 8000, 0, 2000);
        pipeline.process(&block);
        assert_eq!(pipeline.window().len(), 8000);
        assert_eq!(&pipeline.window().samples()[6000..], &block[..]);
    }

    #[test]
    fn detects_and_settles_on_steady_tone() {
        let mut pipeline = DetectionPipeline::new(&small_config());
        let mut outcomes = Vec::new();
        for i in 0..6 {
            outcomes.push(pipeline.process(&tone_block(110.0, 8000, i * 2000, 2000)));
        }

        // from the fourth block on the window is completely filled
        for outcome in &outcomes[3..] {
            let result = outcome.result();
            assert_eq!(result.note, "A2");
            assert!((result.frequency - 110.0).abs() <= 2.0, "{result:?}");
            assert_eq!(result.target_pitch, 110.0);
        }
        assert!(outcomes[4].is_settled());
        assert!(outcomes[5].is_settled());
    }

    #[test]
    fn white_noise_after_gating_stays_well_defined() {
        // pseudo-random noise: whatever the HPS early exit keeps, the result is
        // either the sentinel or a finite positive frequency
        let mut state = 0x2545_f491_u32;
        let mut pipeline = DetectionPipeline::new(&small_config());
        for _ in 0..4 {
            let block: Vec<f32> = (0..2000)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state as f32 / u32::MAX as f32 - 0.5) * 0.02
                })
                .collect();
            let result = pipeline.process(&block).result();
            if result.is_signal() {
                assert!(result.frequency.is_finite() && result.frequency > 0.0);
                assert!(result.target_pitch > 0.0);
            }
        }
    }
}
