use chromatuna_core::{
    audio::ReplaySource,
    pipeline::{BlockOutcome, DetectionPipeline, Rejection},
    DetectionResult, EngineConfig, PitchEngine,
};
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 48_000;
const STEP: usize = 12_000;

/// 110 Hz with five overtones, continuous across block boundaries.
fn a2_with_harmonics(offset: usize, len: usize) -> Vec<f32> {
    let amps = [0.8, 0.6, 0.4, 0.3, 0.2, 0.1];
    (offset..offset + len)
        .map(|n| {
            let t = n as f32 / SAMPLE_RATE as f32;
            amps.iter()
                .enumerate()
                .map(|(h, a)| a * (2.0 * PI * 110.0 * (h + 1) as f32 * t).sin())
                .sum()
        })
        .collect()
}

#[test]
fn a2_is_detected_once_the_window_is_full() {
    let config = EngineConfig::default();
    assert_eq!(config.sample_rate, SAMPLE_RATE);
    assert_eq!(config.step_size, STEP);

    let mut pipeline = DetectionPipeline::new(&config);
    let mut last = None;
    for i in 0..4 {
        last = Some(pipeline.process(&a2_with_harmonics(i * STEP, STEP)));
    }

    let result = last.unwrap().result();
    assert_eq!(result.note, "A2");
    assert!((result.frequency - 110.0).abs() <= 2.0, "{result:?}");
    assert_eq!(result.target_pitch, 110.0);
    assert!(result.difference.abs() <= 2.0);
}

#[test]
fn silence_emits_the_sentinel() {
    let mut pipeline = DetectionPipeline::new(&EngineConfig::default());
    let outcome = pipeline.process(&vec![0.0; STEP]);
    assert_eq!(outcome, BlockOutcome::Rejected(Rejection::EmptyBlock));
    assert_eq!(outcome.result(), DetectionResult::no_signal());
}

#[test]
fn engine_replays_a_recording_end_to_end() {
    let source = ReplaySource::new(a2_with_harmonics(0, STEP * 6));
    let done = source.completion();
    let (tx, rx) = crossbeam_channel::unbounded();

    let config = EngineConfig {
        supervisor_poll_ms: 10,
        ..Default::default()
    };
    let mut engine = PitchEngine::new(config, source, move |r: &DetectionResult| {
        let _ = tx.send(r.clone());
    })
    .unwrap();

    engine.start().unwrap();
    done.recv_timeout(Duration::from_secs(30)).unwrap();
    engine.stop();

    let results: Vec<DetectionResult> = rx.try_iter().collect();
    assert_eq!(results.len(), 7);
    assert!(results[3..6].iter().all(|r| r.note == "A2"));
    assert!(!results[6].is_signal());
}
