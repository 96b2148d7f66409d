//! # Pitch Engine
//!
//! Owns the configuration, the audio source and the detection consumer, and
//! moves between two states:
//!
//! - **Idle**: no stream, no pipeline state
//! - **Running**: a supervisor thread holds the open stream; every delivered
//!   block runs through a fresh [`DetectionPipeline`] on the capture thread
//!
//! ## Threading
//! - **Supervisor thread**: opens the stream, reports the open result back to
//!   [`PitchEngine::start`], then polls the running flag until stopped
//! - **Capture thread**: owned by the source; runs the pipeline and the
//!   consumer callbacks synchronously, one block at a time
//!
//! The pipeline is moved into the block callback, so nothing outside the
//! capture thread can touch the sliding window or the note history.

use crate::{
    audio::{AudioSource, StreamFault, StreamSpec},
    config::EngineConfig,
    error::{CaptureError, EngineError},
    pipeline::{BlockOutcome, DetectionPipeline},
    DetectionResult, DetectionSink,
};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Lifecycle state of a [`PitchEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
}

/// Real-time pitch detection engine.
pub struct PitchEngine<S: AudioSource> {
    config: Arc<EngineConfig>,
    source: Arc<S>,
    sink: Arc<dyn DetectionSink>,
    running: Arc<AtomicBool>,
    supervisor: Option<JoinHandle<()>>,
}

impl<S: AudioSource> PitchEngine<S> {
    /// Validates `config` and builds an idle engine.
    ///
    /// # Returns
    /// * `Err(EngineError::Config)` - The configuration breaks an invariant
    pub fn new(
        config: EngineConfig,
        source: S,
        sink: impl DetectionSink + 'static,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            source: Arc::new(source),
            sink: Arc::new(sink),
            running: Arc::new(AtomicBool::new(false)),
            supervisor: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> EngineState {
        if self.supervisor.is_some() {
            EngineState::Running
        } else {
            EngineState::Idle
        }
    }

    /// Opens the capture stream and starts emitting detections.
    ///
    /// Starting a running engine does nothing. A stream that cannot be opened
    /// leaves the engine idle and is reported here; no retry is attempted.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.supervisor.is_some() {
            info!("[ENGINE] Already running");
            return Ok(());
        }

        let spec = StreamSpec {
            sample_rate: self.config.sample_rate,
            block_size: self.config.step_size,
        };
        let poll_interval = self.config.supervisor_poll_interval();
        let block_period = self.config.block_period();

        let mut pipeline = DetectionPipeline::new(&self.config);
        let source = Arc::clone(&self.source);
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), CaptureError>>(1);

        let on_block = {
            let running = Arc::clone(&self.running);
            let sink = Arc::clone(&self.sink);
            move |block: &[f32]| {
                if !running.load(Ordering::Acquire) {
                    return;
                }
                let outcome = pipeline.process(block);
                if let BlockOutcome::Detected { result, settled: true } = &outcome {
                    sink.on_settled(result);
                }
                sink.on_detection(&outcome.result());
            }
        };
        let on_fault = |fault: StreamFault| {
            warn!("[ENGINE] Stream fault, block dropped: {fault}");
        };

        self.running.store(true, Ordering::Release);

        let spawned = thread::Builder::new()
            .name("chromatuna-supervisor".to_string())
            .spawn(move || {
                let stream = match source.open(&spec, Box::new(on_block), Box::new(on_fault)) {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("[ENGINE] Fatal error opening audio stream: {e}");
                        running.store(false, Ordering::Release);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::Acquire) {
                    thread::sleep(poll_interval);
                }

                drop(stream);
                info!("[ENGINE] Capture stream closed");
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(CaptureError::Thread(e.to_string()).into());
            }
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.supervisor = Some(handle);
                info!(
                    "[ENGINE] Running: {} Hz, window {}, step {} ({:?} per block)",
                    self.config.sample_rate,
                    self.config.window_size,
                    self.config.step_size,
                    block_period
                );
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.into())
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                Err(CaptureError::WorkerGone.into())
            }
        }
    }

    /// Stops consuming blocks and emits one final "no signal" result.
    ///
    /// Stopping an idle engine does nothing.
    pub fn stop(&mut self) {
        let Some(handle) = self.supervisor.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            warn!("[ENGINE] Supervisor thread panicked");
        }

        self.sink.on_detection(&DetectionResult::no_signal());
        info!("[ENGINE] Stopped");
    }
}

impl<S: AudioSource> Drop for PitchEngine<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{BlockCallback, FaultCallback, ReplaySource};
    use crate::error::ConfigError;
    use crossbeam_channel::Receiver;
    use std::f32::consts::PI;
    use std::time::Duration;

    fn test_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 8000,
            window_size: 8000,
            step_size: 2000,
            supervisor_poll_ms: 5,
            ..Default::default()
        }
    }

    fn tone(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                [0.8, 0.6, 0.4, 0.3, 0.2]
                    .iter()
                    .enumerate()
                    .map(|(h, a)| a * (2.0 * PI * freq * (h + 1) as f32 * t).sin())
                    .sum()
            })
            .collect()
    }

    fn recording_sink() -> (impl DetectionSink, Receiver<DetectionResult>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            move |result: &DetectionResult| {
                let _ = tx.send(result.clone());
            },
            rx,
        )
    }

    struct BrokenSource;

    impl AudioSource for BrokenSource {
        type Stream = ();

        fn open(
            &self,
            _spec: &StreamSpec,
            _on_block: BlockCallback,
            _on_fault: FaultCallback,
        ) -> Result<(), CaptureError> {
            Err(CaptureError::NoInputDevice)
        }
    }

    /// Delivers its blocks from `open` with a fault before each one.
    struct FaultySource {
        blocks: Vec<Vec<f32>>,
    }

    impl AudioSource for FaultySource {
        type Stream = ();

        fn open(
            &self,
            _spec: &StreamSpec,
            mut on_block: BlockCallback,
            mut on_fault: FaultCallback,
        ) -> Result<(), CaptureError> {
            for (i, block) in self.blocks.iter().enumerate() {
                on_fault(StreamFault(format!("input overflow {i}")));
                on_block(block);
            }
            Ok(())
        }
    }

    #[test]
    fn invalid_config_never_builds_an_engine() {
        let config = EngineConfig {
            step_size: 16_000,
            window_size: 8000,
            ..test_config()
        };
        let (sink, _rx) = recording_sink();
        let result = PitchEngine::new(config, ReplaySource::new(vec![]), sink);
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::WindowSmallerThanStep { .. }))
        ));
    }

    #[test]
    fn runs_replay_and_emits_sentinel_on_stop() {
        let source = ReplaySource::new(tone(110.0, 8000, 8000 * 3));
        let done = source.completion();
        let (sink, rx) = recording_sink();

        let mut engine = PitchEngine::new(test_config(), source, sink).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);

        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Running);

        done.recv_timeout(Duration::from_secs(10)).unwrap();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Idle);

        let results: Vec<DetectionResult> = rx.try_iter().collect();
        // 12 blocks plus the final sentinel
        assert_eq!(results.len(), 13);
        assert_eq!(results.last(), Some(&DetectionResult::no_signal()));

        for result in &results[3..12] {
            assert_eq!(result.note, "A2");
            assert!((result.frequency - 110.0).abs() <= 2.0);
        }
    }

    #[test]
    fn start_twice_is_a_no_op_and_stop_when_idle_emits_nothing() {
        let source = ReplaySource::new(vec![0.0; 2000]);
        let done = source.completion();
        let (sink, rx) = recording_sink();
        let mut engine = PitchEngine::new(test_config(), source, sink).unwrap();

        engine.stop();
        assert!(rx.try_recv().is_err());

        engine.start().unwrap();
        engine.start().unwrap();
        done.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(done.try_recv().is_err(), "second start must not replay again");

        engine.stop();
        engine.stop();
        let results: Vec<DetectionResult> = rx.try_iter().collect();
        // one silent block, one sentinel for the single stop
        assert_eq!(results, vec![DetectionResult::no_signal(), DetectionResult::no_signal()]);
    }

    #[test]
    fn restart_begins_with_fresh_window() {
        let source = ReplaySource::new(tone(110.0, 8000, 2000));
        let done = source.completion();
        let (sink, rx) = recording_sink();
        let mut engine = PitchEngine::new(test_config(), source, sink).unwrap();

        let mut first_blocks = Vec::new();
        for _ in 0..2 {
            engine.start().unwrap();
            done.recv_timeout(Duration::from_secs(5)).unwrap();
            engine.stop();
            let results: Vec<DetectionResult> = rx.try_iter().collect();
            assert_eq!(results.len(), 2);
            first_blocks.push(results[0].clone());
        }
        // identical input into a reset pipeline gives identical output
        assert_eq!(first_blocks[0], first_blocks[1]);
    }

    #[test]
    fn stream_open_failure_is_fatal_and_engine_stays_idle() {
        let (sink, rx) = recording_sink();
        let mut engine = PitchEngine::new(test_config(), BrokenSource, sink).unwrap();

        let err = engine.start().unwrap_err();
        assert!(matches!(err, EngineError::Capture(CaptureError::NoInputDevice)));
        assert_eq!(engine.state(), EngineState::Idle);

        engine.stop();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stream_faults_drop_nothing_and_keep_the_engine_running() {
        let signal = tone(110.0, 8000, 4000);
        let source = FaultySource {
            blocks: signal.chunks(2000).map(<[f32]>::to_vec).collect(),
        };
        let (sink, rx) = recording_sink();
        let mut engine = PitchEngine::new(test_config(), source, sink).unwrap();

        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        engine.stop();

        let results: Vec<DetectionResult> = rx.try_iter().collect();
        // one result per block, then the stop sentinel
        assert_eq!(results.len(), 3);
        assert_eq!(results[2], DetectionResult::no_signal());
    }

    #[test]
    fn settled_notes_reach_the_sink() {
        struct CountingSink(crossbeam_channel::Sender<String>);

        impl DetectionSink for CountingSink {
            fn on_detection(&self, _result: &DetectionResult) {}

            fn on_settled(&self, result: &DetectionResult) {
                let _ = self.0.send(result.note.clone());
            }
        }

        let source = ReplaySource::new(tone(110.0, 8000, 8000 * 2));
        let done = source.completion();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = PitchEngine::new(test_config(), source, CountingSink(tx)).unwrap();

        engine.start().unwrap();
        done.recv_timeout(Duration::from_secs(10)).unwrap();
        engine.stop();

        let settled: Vec<String> = rx.try_iter().collect();
        assert!(!settled.is_empty());
        assert!(settled.iter().skip(settled.len().saturating_sub(4)).all(|n| n == "A2"));
    }
}
