//! # Chromatuna - Console Tuner
//!
//! Headless front end for the chromatuna pitch engine.
//!
//! ## Architecture
//! - **Main Thread**: prints detections and drives guided tuning
//! - **Capture Thread**: owned by the engine, runs the detection pipeline
//! - **Communication**: Crossbeam channels carry detections to the main thread
//! - **Input Thread**: reads console commands (next string, stop)

mod display;
mod presets;

use anyhow::{bail, Context, Result};
use chromatuna_core::{
    audio::{self, AudioSource, CpalSource, ReplaySource},
    guided::{GuidedSession, GuidedStep, TuningPresets, DEFAULT_TOLERANCE_HZ},
    DetectionResult, DetectionSink, EngineConfig, PitchEngine,
};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use presets::PresetTable;
use std::fs::File;
use std::io::BufReader;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "chromatuna", version, about = "Chromatic string tuner")]
struct Cli {
    /// JSON file overriding engine settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Frequency of A4 in Hz
    #[arg(long, global = true)]
    reference_pitch: Option<f32>,

    /// Number of harmonic product spectrum rounds
    #[arg(long, global = true)]
    harmonics: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct CaptureArgs {
    /// Input device name (default input device if omitted)
    #[arg(long)]
    device: Option<String>,

    /// Stop after this many seconds instead of waiting for Enter
    #[arg(long)]
    seconds: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chromatic tuner: show the nearest note for whatever is played
    Listen(CaptureArgs),
    /// Tune an instrument string by string
    Guided {
        #[arg(long, default_value = "guitar")]
        instrument: String,
        #[arg(long, default_value = "standard")]
        tuning: String,
        /// JSON preset table replacing the built-in one
        #[arg(long)]
        presets: Option<PathBuf>,
        /// Distance from the target in Hz that counts as tuned
        #[arg(long, default_value_t = DEFAULT_TOLERANCE_HZ)]
        tolerance: f32,
        #[command(flatten)]
        capture: CaptureArgs,
    },
    /// Run a WAV recording through the detector
    Analyze {
        file: PathBuf,
        /// Replay at recording speed instead of as fast as possible
        #[arg(long)]
        realtime: bool,
    },
    /// List audio input devices
    Devices,
    /// List available tuning presets
    Presets {
        #[arg(long)]
        presets: Option<PathBuf>,
    },
}

/// Messages handled by the main loop.
#[derive(Debug, Clone, PartialEq)]
enum TunerEvent {
    Detection(DetectionResult),
    Settled(DetectionResult),
    /// The user asked to move on without tuning the current string.
    NextString,
}

/// Commands typed on the console, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    /// `n` + Enter
    NextString,
    /// Enter on its own, any other input, or end of input
    Quit,
}

impl ConsoleCommand {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "n" | "N" | "next" => ConsoleCommand::NextString,
            _ => ConsoleCommand::Quit,
        }
    }
}

/// Forwards engine callbacks into a channel so the capture thread never blocks.
struct ChannelSink(Sender<TunerEvent>);

impl DetectionSink for ChannelSink {
    fn on_detection(&self, result: &DetectionResult) {
        let _ = self.0.send(TunerEvent::Detection(result.clone()));
    }

    fn on_settled(&self, result: &DetectionResult) {
        let _ = self.0.send(TunerEvent::Settled(result.clone()));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Command::Listen(capture) => listen(config, capture),
        Command::Guided {
            instrument,
            tuning,
            presets,
            tolerance,
            capture,
        } => {
            let table = load_presets(presets.as_deref())?;
            let session = GuidedSession::from_presets(&table, &instrument, &tuning)
                .with_context(|| format!("no preset '{tuning}' for instrument '{instrument}'"))?
                .with_tolerance(tolerance);
            guided(config, capture, session)
        }
        Command::Analyze { file, realtime } => analyze(config, &file, realtime),
        Command::Devices => {
            for name in audio::list_input_devices()? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Presets { presets } => {
            let table = load_presets(presets.as_deref())?;
            for (instrument, key, name) in table.entries() {
                let strings = table.strings(instrument, key).unwrap_or_default();
                let labels: Vec<String> = strings
                    .iter()
                    .map(|s| format!("{} {:.2}", s.label, s.frequency))
                    .collect();
                println!("{instrument:<10} {key:<12} {name:<12} {}", labels.join(", "));
            }
            Ok(())
        }
    }
}

/// Defaults, then the config file, then command line overrides.
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(reference_pitch) = cli.reference_pitch {
        config.reference_pitch = reference_pitch;
    }
    if let Some(harmonics) = cli.harmonics {
        config.harmonic_count = harmonics;
    }
    Ok(config)
}

/// Loads engine settings from a JSON file; missing keys keep their defaults.
fn load_config(path: &Path) -> Result<EngineConfig> {
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let config = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn load_presets(path: Option<&Path>) -> Result<PresetTable> {
    match path {
        Some(path) => PresetTable::load(path),
        None => Ok(PresetTable::builtin().clone()),
    }
}

/// Forwards console commands until the first `Quit` (or stdin closes).
fn spawn_console_listener() -> Receiver<ConsoleCommand> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            let command = match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => ConsoleCommand::Quit,
                Ok(_) => ConsoleCommand::parse(&line),
            };
            if tx.send(command).is_err() || command == ConsoleCommand::Quit {
                break;
            }
        }
    });
    rx
}

/// Starts the engine and feeds events to `handle` until it breaks, a `Quit`
/// command arrives, `done` fires or `limit` elapses. Then stops the engine
/// and drains what is left.
fn run_session<S: AudioSource>(
    engine: &mut PitchEngine<S>,
    events: &Receiver<TunerEvent>,
    commands: &Receiver<ConsoleCommand>,
    done: &Receiver<()>,
    limit: Option<Duration>,
    mut handle: impl FnMut(TunerEvent) -> ControlFlow<()>,
) -> Result<()> {
    engine.start().context("starting the tuner")?;

    let timeout = limit
        .map(crossbeam_channel::after)
        .unwrap_or_else(crossbeam_channel::never);

    loop {
        crossbeam_channel::select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    if handle(event).is_break() {
                        break;
                    }
                }
                Err(_) => {
                    warn!("[MAIN] Detection channel closed");
                    break;
                }
            },
            recv(commands) -> msg => match msg {
                Ok(ConsoleCommand::NextString) => {
                    if handle(TunerEvent::NextString).is_break() {
                        break;
                    }
                }
                Ok(ConsoleCommand::Quit) | Err(_) => break,
            },
            recv(done) -> _ => {
                info!("[MAIN] Recording finished");
                break;
            }
            recv(timeout) -> _ => {
                info!("[MAIN] Time limit reached");
                break;
            }
        }
    }

    engine.stop();
    for event in events.try_iter() {
        let _ = handle(event);
    }
    Ok(())
}

fn listen(config: EngineConfig, capture: CaptureArgs) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut engine = PitchEngine::new(config, CpalSource::new(capture.device), ChannelSink(tx))?;

    println!("Listening... press Enter to stop.");
    let commands = spawn_console_listener();
    run_session(
        &mut engine,
        &rx,
        &commands,
        &crossbeam_channel::never(),
        capture.seconds.map(Duration::from_secs),
        |event| {
            if let TunerEvent::Detection(result) = event {
                println!("{}", display::format_detection(&result));
            }
            ControlFlow::Continue(())
        },
    )
}

fn guided(config: EngineConfig, capture: CaptureArgs, mut session: GuidedSession) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut engine = PitchEngine::new(config, CpalSource::new(capture.device), ChannelSink(tx))?;

    if let Some(first) = session.current() {
        println!(
            "Tune {} to {:.2} Hz ({} strings). Type n + Enter for the next string, Enter to stop.",
            first.label,
            first.frequency,
            session.remaining()
        );
    }

    let commands = spawn_console_listener();
    run_session(
        &mut engine,
        &rx,
        &commands,
        &crossbeam_channel::never(),
        capture.seconds.map(Duration::from_secs),
        |event| {
            let (line, flow) = guided_event(&mut session, event);
            if let Some(line) = line {
                println!("{line}");
            }
            flow
        },
    )
}

/// Applies one event to the guided session. Returns the line to print and
/// whether the session goes on.
fn guided_event(
    session: &mut GuidedSession,
    event: TunerEvent,
) -> (Option<String>, ControlFlow<()>) {
    match event {
        TunerEvent::Settled(result) => match session.observe(&result, true) {
            GuidedStep::Advanced { tuned, next } => (
                Some(format!("{tuned} is in tune. Next: {next}")),
                ControlFlow::Continue(()),
            ),
            GuidedStep::Finished { tuned } => (
                Some(format!("{tuned} is in tune. All strings done.")),
                ControlFlow::Break(()),
            ),
            GuidedStep::Complete => (None, ControlFlow::Break(())),
            GuidedStep::Listening => (None, ControlFlow::Continue(())),
        },
        TunerEvent::Detection(result) => (
            session
                .current()
                .map(|target| display::format_guided(&result, target)),
            ControlFlow::Continue(()),
        ),
        TunerEvent::NextString => {
            let Some(skipped) = session.current().map(|target| target.label.clone()) else {
                return (None, ControlFlow::Break(()));
            };
            match session.skip() {
                Some(next) => (
                    Some(format!("Skipped {skipped}. Next: {}", next.label)),
                    ControlFlow::Continue(()),
                ),
                None => (
                    Some(format!("Skipped {skipped}. No strings left.")),
                    ControlFlow::Break(()),
                ),
            }
        }
    }
}

fn analyze(config: EngineConfig, path: &Path, realtime: bool) -> Result<()> {
    let (sample_rate, samples) = read_wav_mono(path)?;
    if sample_rate != config.sample_rate {
        bail!(
            "{} is recorded at {} Hz but the tuner is configured for {} Hz",
            path.display(),
            sample_rate,
            config.sample_rate
        );
    }

    let blocks = samples.len() / config.step_size;
    let mut source = ReplaySource::new(samples);
    if realtime {
        source = source.with_pacing(config.block_period());
    }
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut engine = PitchEngine::new(config, source, ChannelSink(tx))?;
    let done = engine.source().completion();
    let block_seconds = engine.config().block_period().as_secs_f32();
    info!("[MAIN] Analyzing {} blocks from {}", blocks, path.display());

    let mut block = 0usize;
    run_session(
        &mut engine,
        &rx,
        &crossbeam_channel::never(),
        &done,
        None,
        |event| {
            if let TunerEvent::Detection(result) = event {
                if let Some(line) = analysis_line(block, blocks, block_seconds, &result) {
                    println!("{line}");
                }
                block += 1;
            }
            ControlFlow::Continue(())
        },
    )
}

/// Timestamped line for the `index`-th detection; `None` past the last block
/// (the sentinel emitted when the engine stops).
fn analysis_line(
    index: usize,
    blocks: usize,
    block_seconds: f32,
    result: &DetectionResult,
) -> Option<String> {
    (index < blocks).then(|| {
        format!(
            "{:>8.2}s  {}",
            index as f32 * block_seconds,
            display::format_detection(result)
        )
    })
}

/// Reads the first channel of a WAV file as f32 samples in [-1, 1].
fn read_wav_mono(path: &Path) -> Result<(u32, Vec<f32>)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("reading {}", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("reading {}", path.display()))?
        }
    };

    Ok((spec.sample_rate, interleaved.into_iter().step_by(channels).collect()))
}
