//! # Guided Tuning
//!
//! Walks the player through an instrument's strings one at a time. The
//! ordered targets come from an external preset table ([`TuningPresets`]);
//! the session only consumes them. A string counts as tuned once a settled
//! detection lands within the tolerance of its target, and the session then
//! moves on to the next string.

use crate::DetectionResult;

/// Default distance from the target, in Hz, that counts as in tune.
pub const DEFAULT_TOLERANCE_HZ: f32 = 1.0;

/// One string of a tuning preset.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetString {
    /// Display label, e.g. "E2" or "6th".
    pub label: String,
    pub frequency: f32,
}

impl TargetString {
    pub fn new(label: impl Into<String>, frequency: f32) -> Self {
        Self {
            label: label.into(),
            frequency,
        }
    }
}

/// Lookup of instrument + tuning name to the ordered target strings.
pub trait TuningPresets {
    fn strings(&self, instrument: &str, tuning: &str) -> Option<Vec<TargetString>>;
}

/// What a detection did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidedStep {
    /// Nothing changed: no signal, not settled yet, or still out of tune.
    Listening,
    /// `tuned` is done; `next` is the new target.
    Advanced { tuned: String, next: String },
    /// The last string was tuned.
    Finished { tuned: String },
    /// Every string was already tuned before this detection.
    Complete,
}

/// String-by-string tuning progress.
#[derive(Debug, Clone)]
pub struct GuidedSession {
    strings: Vec<TargetString>,
    index: usize,
    tolerance_hz: f32,
}

impl GuidedSession {
    pub fn new(strings: Vec<TargetString>) -> Self {
        Self {
            strings,
            index: 0,
            tolerance_hz: DEFAULT_TOLERANCE_HZ,
        }
    }

    /// Starts a session from a preset lookup; `None` if the preset is unknown.
    pub fn from_presets(
        presets: &impl TuningPresets,
        instrument: &str,
        tuning: &str,
    ) -> Option<Self> {
        presets.strings(instrument, tuning).map(Self::new)
    }

    pub fn with_tolerance(mut self, tolerance_hz: f32) -> Self {
        self.tolerance_hz = tolerance_hz.abs();
        self
    }

    pub fn current(&self) -> Option<&TargetString> {
        self.strings.get(self.index)
    }

    /// Strings not yet tuned, including the current one.
    pub fn remaining(&self) -> usize {
        self.strings.len().saturating_sub(self.index)
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.strings.len()
    }

    /// Signed distance of `result` from the current target in Hz.
    pub fn offset(&self, result: &DetectionResult) -> Option<f32> {
        if !result.is_signal() {
            return None;
        }
        self.current().map(|target| result.frequency - target.frequency)
    }

    /// Feeds one detection; only settled detections can advance the session.
    pub fn observe(&mut self, result: &DetectionResult, settled: bool) -> GuidedStep {
        if self.is_complete() {
            return GuidedStep::Complete;
        }
        if !settled {
            return GuidedStep::Listening;
        }
        match self.offset(result) {
            Some(offset) if offset.abs() <= self.tolerance_hz => {}
            _ => return GuidedStep::Listening,
        }

        let tuned = self.strings[self.index].label.clone();
        self.index += 1;
        match self.current() {
            Some(next) => GuidedStep::Advanced {
                tuned,
                next: next.label.clone(),
            },
            None => GuidedStep::Finished { tuned },
        }
    }

    /// Skips the current string without tuning it.
    pub fn skip(&mut self) -> Option<&TargetString> {
        if !self.is_complete() {
            self.index += 1;
        }
        self.current()
    }
}
