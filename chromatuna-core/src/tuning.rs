//! # Note Mapper
//!
//! Equal-tempered quantization of a frequency to the nearest note. The
//! reference pitch is note index 0 of the configured names in octave 4
//! (A4 = 440 Hz by default); octave numbers change at the note three
//! semitones above it (C), as on a piano.

/// A quantized note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Note name with octave (e.g., "A4", "C#3")
    pub label: String,
    /// Signed semitone distance from the reference pitch
    pub semitones: i32,
    pub octave: i32,
    /// Exact equal-tempered frequency of the note in Hz
    pub frequency: f32,
}

/// Maps frequencies onto a 12-tone equal-tempered scale.
#[derive(Debug, Clone)]
pub struct NoteMapper {
    reference_pitch: f32,
    note_names: Vec<String>,
}

impl NoteMapper {
    /// # Arguments
    /// * `reference_pitch` - Frequency of the reference note in Hz
    /// * `note_names` - The 12 note names, starting at the reference note
    pub fn new(reference_pitch: f32, note_names: Vec<String>) -> Self {
        Self {
            reference_pitch,
            note_names,
        }
    }

    /// Finds the nearest equal-tempered note to `frequency`.
    ///
    /// `frequency` must be positive; callers filter out empty spectra first.
    /// Semitone counts exactly halfway between two notes round to even.
    pub fn map_to_note(&self, frequency: f32) -> Note {
        let ratio = frequency as f64 / self.reference_pitch as f64;
        let semitones = (12.0 * ratio.log2()).round_ties_even() as i32;
        self.note_at(semitones)
    }

    /// The note `semitones` above (or below) the reference pitch.
    pub fn note_at(&self, semitones: i32) -> Note {
        let name = &self.note_names[semitones.rem_euclid(12) as usize];
        let octave = 4 + (semitones + 9).div_euclid(12);
        let frequency = (self.reference_pitch as f64 * 2f64.powf(semitones as f64 / 12.0)) as f32;

        Note {
            label: format!("{name}{octave}"),
            semitones,
            octave,
            frequency,
        }
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
