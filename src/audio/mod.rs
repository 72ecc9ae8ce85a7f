use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use groovestep::audio_api::{AudioCommand, ChannelSink};
use groovestep::shared::Time;

mod engine;
mod frame;
mod sample_buffer;
mod voice;

pub use engine::Kit;
use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;

use engine::Engine;

/// The default output device, opened but not yet playing. The kit has to be
/// resampled to its rate before the stream starts.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    pub fn open() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("no default output device")?;
        let config = device.default_output_config().context("no default output config")?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            anyhow::bail!("unsupported sample format (only f32 supported for now)");
        }
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate()
    }

    pub fn start(self, kit: Kit) -> anyhow::Result<AudioHandle> {
        let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);
        let frames = Arc::new(AtomicU64::new(0));
        let ready = Arc::new(AtomicBool::new(false));
        let sample_rate = self.sample_rate();
        let channels = self.config.channels() as usize;

        let engine = Engine::new(sample_rate, kit, frames.clone(), ready.clone());
        let stream = build_output_stream_f32(&self.device, &self.config.into(), rx, engine, channels)?;
        stream.play().context("failed to play output stream")?;
        log::info!("audio running at {sample_rate} Hz, {channels} channel(s)");

        Ok(AudioHandle { tx, frames, ready, sample_rate, _output_stream: stream })
    }
}

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    frames: Arc<AtomicU64>,
    ready: Arc<AtomicBool>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    // not ready until the first block renders
    pub fn sink(&self) -> ChannelSink {
        ChannelSink::new(self.tx.clone(), self.ready.clone())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    // the stream takes a moment to render its first block
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.is_ready() && start.elapsed() < timeout {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.is_ready()
    }

    /// Seconds of audio rendered so far. This is the clock the transport follows.
    pub fn time(&self) -> Time {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    // mixes in stereo, then spreads to however many channels the device has
    let mut scratch: Vec<StereoFrame> = Vec::with_capacity(8192);
    let err_fn = |err| eprintln!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }
            let n_frames = data.len() / channels.max(1);
            scratch.resize(n_frames, StereoFrame::zero());
            engine.render_block(&mut scratch);
            for (out, frame) in data.chunks_exact_mut(channels.max(1)).zip(&scratch) {
                match out {
                    [mono] => *mono = (frame.left + frame.right) * 0.5,
                    [left, right, rest @ ..] => {
                        *left = frame.left;
                        *right = frame.right;
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
