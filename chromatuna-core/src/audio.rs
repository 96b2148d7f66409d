//! # Audio Capture Module
//!
//! The boundary between the pitch engine and whatever produces samples.
//! The engine only needs "deliver fixed-size mono blocks to a handler", which
//! is what [`AudioSource`] describes. Two sources ship with the crate:
//!
//! - [`CpalSource`]: real-time capture from an input device using CPAL
//! - [`ReplaySource`]: replays an in-memory recording, for offline analysis
//!   and tests without audio hardware
//!
//! A source's stream handle stays on the thread that opened it; dropping the
//! handle closes the stream.

use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};
use log::info;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What the engine asks a source for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    /// Every delivered block has exactly this many samples.
    pub block_size: usize,
}

/// A non-fatal problem reported by a running stream (overrun, glitch...).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFault(pub String);

impl fmt::Display for StreamFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receives each block of `block_size` mono samples, in order.
pub type BlockCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;
/// Receives non-fatal stream faults.
pub type FaultCallback = Box<dyn FnMut(StreamFault) + Send + 'static>;

/// Something that can deliver fixed-size blocks of mono samples.
pub trait AudioSource: Send + Sync + 'static {
    /// Keeps the stream alive; dropping it stops delivery.
    type Stream;

    /// Opens and starts a stream. Failing here is fatal for the caller.
    fn open(
        &self,
        spec: &StreamSpec,
        on_block: BlockCallback,
        on_fault: FaultCallback,
    ) -> Result<Self::Stream, CaptureError>;
}

/// Cuts arbitrarily sized interleaved device buffers into fixed mono blocks.
struct BlockAssembler {
    channels: usize,
    block_size: usize,
    pending: Vec<f32>,
}

impl BlockAssembler {
    fn new(channels: usize, block_size: usize) -> Self {
        Self {
            channels: channels.max(1),
            block_size,
            pending: Vec::with_capacity(block_size * 2),
        }
    }

    /// Appends the first channel of `data` and emits every complete block.
    fn feed(&mut self, data: &[f32], mut emit: impl FnMut(&[f32])) {
        self.pending
            .extend(data.chunks(self.channels).map(|frame| frame[0]));

        while self.pending.len() >= self.block_size {
            emit(&self.pending[..self.block_size]);
            self.pending.drain(..self.block_size);
        }
    }
}

/// Real-time capture from an input device.
#[derive(Debug, Clone, Default)]
pub struct CpalSource {
    /// Exact device name; `None` selects the host's default input device.
    pub device_name: Option<String>,
}

impl CpalSource {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn select_device(&self, host: &cpal::Host) -> Result<cpal::Device, CaptureError> {
        match &self.device_name {
            Some(wanted) => host
                .input_devices()
                .map_err(|e| CaptureError::DeviceQuery(e.to_string()))?
                .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
                .ok_or(CaptureError::NoInputDevice),
            None => host.default_input_device().ok_or(CaptureError::NoInputDevice),
        }
    }
}

impl AudioSource for CpalSource {
    type Stream = cpal::Stream;

    fn open(
        &self,
        spec: &StreamSpec,
        mut on_block: BlockCallback,
        mut on_fault: FaultCallback,
    ) -> Result<cpal::Stream, CaptureError> {
        let host = cpal::default_host();
        let device = self.select_device(&host)?;

        info!(
            "[AUDIO] Using audio input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        let configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::DeviceQuery(e.to_string()))?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, spec.sample_rate)
            .ok_or(CaptureError::NoSupportedFormat(spec.sample_rate))?;

        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(spec.sample_rate))
            .into();

        info!(
            "[AUDIO] Selected {} Hz, {} channel(s), {} samples per block",
            spec.sample_rate, config.channels, spec.block_size
        );

        let mut assembler = BlockAssembler::new(config.channels as usize, spec.block_size);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.feed(data, |block| on_block(block));
                },
                move |err| on_fault(StreamFault(err.to_string())),
                None,
            )
            .map_err(|e| CaptureError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::StreamPlay(e.to_string()))?;

        Ok(stream)
    }
}

/// Finds the best supported f32 input configuration for `target_rate`.
///
/// Only ranges that contain the target rate qualify; among those the one
/// with the fewest channels wins, so a mono configuration is preferred.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() >= 1 && c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceQuery(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Replays a recording block by block on its own thread.
///
/// A trailing partial block is not delivered. Each completed replay is
/// announced on [`ReplaySource::completion`].
#[derive(Debug, Clone)]
pub struct ReplaySource {
    samples: Arc<Vec<f32>>,
    pacing: Option<Duration>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl ReplaySource {
    pub fn new(samples: Vec<f32>) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Self {
            samples: Arc::new(samples),
            pacing: None,
            done_tx,
            done_rx,
        }
    }

    /// Sleeps this long after every block, e.g. the block period for real-time playback.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Receives `()` each time a replay has delivered its last block.
    pub fn completion(&self) -> Receiver<()> {
        self.done_rx.clone()
    }
}

/// Handle of a running replay. Dropping it stops delivery and joins the thread.
pub struct ReplayStream {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for ReplayStream {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl AudioSource for ReplaySource {
    type Stream = ReplayStream;

    fn open(
        &self,
        spec: &StreamSpec,
        mut on_block: BlockCallback,
        _on_fault: FaultCallback,
    ) -> Result<ReplayStream, CaptureError> {
        let samples = Arc::clone(&self.samples);
        let pacing = self.pacing;
        let done_tx = self.done_tx.clone();
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancelled);
        let block_size = spec.block_size.max(1);

        let handle = thread::Builder::new()
            .name("chromatuna-replay".to_string())
            .spawn(move || {
                for block in samples.chunks_exact(block_size) {
                    if cancel_flag.load(Ordering::Acquire) {
                        return;
                    }
                    on_block(block);
                    if let Some(pause) = pacing {
                        thread::sleep(pause);
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(|e| CaptureError::Thread(e.to_string()))?;

        Ok(ReplayStream {
            cancelled,
            handle: Some(handle),
        })
    }
}
