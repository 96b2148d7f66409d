//! # Console Display
//!
//! Text rendering of detections: note, measured and target frequency,
//! difference in Hz and cents, and a small cent meter.

use chromatuna_core::{guided::TargetString, tuning::calculate_cents_deviation, DetectionResult};

/// Maximum cent deviation range for the meter display.
/// The meter shows deviations from -50 to +50 cents.
const METER_RANGE: f32 = 50.0;
/// Character cells on each side of the meter's center mark.
const METER_HALF_WIDTH: usize = 10;

/// How close a reading is to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    InTune,
    Close,
    Off,
}

impl Accuracy {
    pub fn from_cents(cents: f32) -> Self {
        if cents.abs() < 5.0 {
            Accuracy::InTune
        } else if cents.abs() < 20.0 {
            Accuracy::Close
        } else {
            Accuracy::Off
        }
    }

    fn marker(self) -> char {
        match self {
            Accuracy::InTune => '|',
            Accuracy::Close => '*',
            Accuracy::Off => '!',
        }
    }
}

/// Renders a cent deviation as `[----------|----------]` with a needle.
pub fn cent_meter(cents: Option<f32>) -> String {
    let mut cells = vec!['-'; METER_HALF_WIDTH * 2 + 1];
    cells[METER_HALF_WIDTH] = ':';

    if let Some(c) = cents {
        let clamped = c.clamp(-METER_RANGE, METER_RANGE);
        let span = (cells.len() - 1) as f32;
        let position = ((clamped + METER_RANGE) / (2.0 * METER_RANGE) * span).round() as usize;
        cells[position] = Accuracy::from_cents(c).marker();
    }

    format!("[{}]", cells.into_iter().collect::<String>())
}

/// Signed difference with one decimal and an explicit `+`; empty when zero.
fn signed(value: f32) -> String {
    if value > 0.0 {
        format!("+{value:.1}")
    } else if value < 0.0 {
        format!("{value:.1}")
    } else {
        String::new()
    }
}

/// One status line for the chromatic tuner.
pub fn format_detection(result: &DetectionResult) -> String {
    if !result.is_signal() {
        return format!("{:<4} {:>7} / {:<7} {}", "-", "-", "-", cent_meter(None));
    }

    let cents = result.cents_deviation();
    format!(
        "{:<4} {:>7.1} / {:<7.1} {} {:>6} Hz {:>6} ct",
        result.note,
        result.frequency,
        result.target_pitch,
        cent_meter(cents),
        signed(result.difference),
        cents.map(|c| format!("{c:+.0}")).unwrap_or_default(),
    )
}

/// One status line while tuning a specific string.
pub fn format_guided(result: &DetectionResult, target: &TargetString) -> String {
    if !result.is_signal() {
        return format!("string {:<4} target {:>7.1} Hz  -", target.label, target.frequency);
    }

    let cents = calculate_cents_deviation(result.frequency, target.frequency);
    format!(
        "string {:<4} target {:>7.1} Hz  heard {:<4} {:>7.1} Hz {} {:>6} Hz",
        target.label,
        target.frequency,
        result.note,
        result.frequency,
        cent_meter(Some(cents)),
        signed(result.frequency - target.frequency),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_needle_positions() {
        assert_eq!(cent_meter(None), "[----------:----------]");
        assert_eq!(cent_meter(Some(0.0)), "[----------|----------]");
        assert_eq!(cent_meter(Some(-50.0)), "[!---------:----------]");
        assert_eq!(cent_meter(Some(400.0)), "[----------:---------!]");
        assert_eq!(cent_meter(Some(10.0)), "[----------:-*--------]");
    }

    #[test]
    fn accuracy_zones() {
        assert_eq!(Accuracy::from_cents(-4.9), Accuracy::InTune);
        assert_eq!(Accuracy::from_cents(12.0), Accuracy::Close);
        assert_eq!(Accuracy::from_cents(-25.0), Accuracy::Off);
    }

    #[test]
    fn signed_differences() {
        assert_eq!(signed(0.9), "+0.9");
        assert_eq!(signed(-1.24), "-1.2");
        assert_eq!(signed(0.0), "");
    }

    #[test]
    fn sentinel_line_shows_dashes() {
        let line = format_detection(&DetectionResult::no_signal());
        assert!(line.starts_with("-"));
        assert!(line.ends_with("[----------:----------]"));
    }

    #[test]
    fn detection_line_contains_fields() {
        let line = format_detection(&DetectionResult::new("A2".into(), 110.6, 110.0));
        assert!(line.starts_with("A2"));
        assert!(line.contains("110.6 / 110.0"));
        assert!(line.contains("+0.6 Hz"));
    }

    #[test]
    fn guided_line_measures_against_target() {
        let target = TargetString::new("E2", 82.41);
        let line = format_guided(&DetectionResult::new("E2".into(), 83.0, 82.4), &target);
        assert!(line.contains("string E2"));
        assert!(line.contains("+0.6 Hz"));
    }
}
