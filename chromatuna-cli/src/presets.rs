//! # Tuning Presets
//!
//! Instrument → tuning → ordered string targets. A small table is built in;
//! a JSON file of the same shape can replace it:
//!
//! ```json
//! { "guitar": { "standard": { "name": "Standard", "strings": [["E2", 82.41], ...] } } }
//! ```

use anyhow::{Context, Result};
use chromatuna_core::guided::{TargetString, TuningPresets};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One named tuning of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Display name, e.g. "Drop D".
    pub name: String,
    /// Strings in tuning order as (label, frequency in Hz).
    pub strings: Vec<(String, f32)>,
}

/// All presets, keyed by instrument then tuning key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetTable(pub BTreeMap<String, BTreeMap<String, Preset>>);

fn preset(name: &str, strings: &[(&str, f32)]) -> Preset {
    Preset {
        name: name.to_string(),
        strings: strings.iter().map(|&(l, f)| (l.to_string(), f)).collect(),
    }
}

static BUILTIN: Lazy<PresetTable> = Lazy::new(|| {
    let mut table = BTreeMap::new();

    let mut guitar = BTreeMap::new();
    guitar.insert(
        "standard".to_string(),
        preset(
            "Standard",
            &[
                ("E2", 82.41),
                ("A2", 110.0),
                ("D3", 146.83),
                ("G3", 196.0),
                ("B3", 246.94),
                ("E4", 329.63),
            ],
        ),
    );
    guitar.insert(
        "drop_d".to_string(),
        preset(
            "Drop D",
            &[
                ("D2", 73.42),
                ("A2", 110.0),
                ("D3", 146.83),
                ("G3", 196.0),
                ("B3", 246.94),
                ("E4", 329.63),
            ],
        ),
    );
    table.insert("guitar".to_string(), guitar);

    let mut bass = BTreeMap::new();
    bass.insert(
        "standard".to_string(),
        preset("Standard", &[("E1", 41.2), ("A1", 55.0), ("D2", 73.42), ("G2", 98.0)]),
    );
    table.insert("bass".to_string(), bass);

    let mut ukulele = BTreeMap::new();
    ukulele.insert(
        "standard".to_string(),
        preset("Standard", &[("G4", 392.0), ("C4", 261.63), ("E4", 329.63), ("A4", 440.0)]),
    );
    table.insert("ukulele".to_string(), ukulele);

    PresetTable(table)
});

impl PresetTable {
    pub fn builtin() -> &'static PresetTable {
        &BUILTIN
    }

    /// Loads a preset table from a JSON file.
    pub fn load(path: &Path) -> Result<PresetTable> {
        let file = File::open(path)
            .with_context(|| format!("opening preset file {}", path.display()))?;
        let table = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing preset file {}", path.display()))?;
        Ok(table)
    }

    pub fn get(&self, instrument: &str, tuning: &str) -> Option<&Preset> {
        self.0.get(instrument)?.get(tuning)
    }

    /// (instrument, tuning key, display name) for every preset.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.0.iter().flat_map(|(instrument, tunings)| {
            tunings.iter().map(move |(key, preset)| {
                (instrument.as_str(), key.as_str(), preset.name.as_str())
            })
        })
    }
}

impl TuningPresets for PresetTable {
    fn strings(&self, instrument: &str, tuning: &str) -> Option<Vec<TargetString>> {
        self.get(&instrument.to_lowercase(), &tuning.to_lowercase()).map(|preset| {
            preset
                .strings
                .iter()
                .map(|(label, frequency)| TargetString::new(label.clone(), *frequency))
                .collect()
        })
    }
}
