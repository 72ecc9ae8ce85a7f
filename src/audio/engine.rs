use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use groovestep::audio_api::{AudioCommand, TriggerParams};
use groovestep::shared::InstrumentKey;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::Voice;

const MAX_VOICES: usize = 32; // hard caps so we never allocate in the audio callback
const MAX_PENDING: usize = 512;

pub type Kit = HashMap<InstrumentKey, Arc<SampleBuffer>>;

// a trigger waiting for its frame
struct Pending {
    frame: u64,
    instrument: InstrumentKey,
    params: TriggerParams,
}

pub struct Engine {
    sample_rate: f32,
    kit: Kit,
    voices: Vec<Voice>,
    pending: Vec<Pending>,
    clock: u64, // frames rendered so far
    frames: Arc<AtomicU64>,
    ready: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(sample_rate: u32, kit: Kit, frames: Arc<AtomicU64>, ready: Arc<AtomicBool>) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            kit,
            voices: Vec::with_capacity(MAX_VOICES),
            pending: Vec::with_capacity(MAX_PENDING),
            clock: 0,
            frames,
            ready,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Trigger { instrument, params } => {
                if self.pending.len() < MAX_PENDING {
                    let frame = (params.time.max(0.0) * self.sample_rate as f64).round() as u64;
                    self.pending.push(Pending { frame, instrument, params });
                }
            }
            AudioCommand::CancelScheduled => self.pending.clear(),
        }
    }

    // unknown instruments get a tone instead of silence
    fn start_voice(&mut self, pending: &Pending, delay: usize) {
        let voice = match self.kit.get(&pending.instrument) {
            Some(buffer) => Voice::sample(buffer.clone(), &pending.params, self.sample_rate, delay),
            None => Voice::tone(&pending.params, self.sample_rate, delay),
        };
        if self.voices.len() < MAX_VOICES {
            self.voices.push(voice);
        } else if let Some(slot) = self.voices.iter_mut().find(|v| !v.active) {
            *slot = voice;
        } else {
            self.voices[0] = voice; // steal the oldest
        }
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());
        let start = self.clock;
        let end = start + out.len() as u64;

        // start everything due in this block at its exact frame; late ones start now
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].frame < end {
                let pending = self.pending.swap_remove(i);
                let delay = pending.frame.saturating_sub(start) as usize;
                self.start_voice(&pending, delay);
            } else {
                i += 1;
            }
        }

        for voice in &mut self.voices {
            voice.render_into(out);
        }
        self.voices.retain(|v| v.active);

        self.clock = end;
        self.frames.store(end, Ordering::Release);
        self.ready.store(true, Ordering::Release);
    }
}
