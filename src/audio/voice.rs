use std::sync::Arc;

use groovestep::audio_api::TriggerParams;
use groovestep::shared::midi_to_freq;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

const DEFAULT_RELEASE_SECS: f32 = 0.01;
const TONE_DECAY_SECS: f32 = 0.4;
const SILENCE: f32 = 0.0005;

#[derive(Clone, Debug)]
enum Source {
    Sample { buffer: Arc<SampleBuffer>, pos: f32, rate: f32 },
    // fallback for instruments the kit doesn't have
    Tone { phase: f32, phase_inc: f32 },
}

#[derive(Clone, Debug)]
pub struct Voice {
    source: Source,
    gain: f32,
    pan: f32,
    pub active: bool,
    // frames left before this voice starts sounding, for sample-accurate starts
    delay: usize,
    // frames until release, None rings out
    gate: Option<usize>,
    releasing: bool,
    decay: f32,
}

impl Voice {
    // pitch_offset and note (relative to c4) shift it
    pub fn sample(buffer: Arc<SampleBuffer>, params: &TriggerParams, sample_rate: f32, delay: usize) -> Self {
        let semis = params.pitch_offset + params.note.map(|n| i32::from(n) - 60).unwrap_or(0);
        let rate = 2.0_f32.powf(semis as f32 / 12.0);
        Self::new(Source::Sample { buffer, pos: 0.0, rate }, params, sample_rate, delay)
    }

    pub fn tone(params: &TriggerParams, sample_rate: f32, delay: usize) -> Self {
        let note = params.note.map(f32::from).unwrap_or(60.0) + params.pitch_offset as f32;
        let phase_inc = std::f32::consts::TAU * midi_to_freq(note) / sample_rate;
        let mut voice = Self::new(Source::Tone { phase: 0.0, phase_inc }, params, sample_rate, delay);
        voice.gain *= 0.25;
        if voice.gate.is_none() {
            voice.releasing = true;
            voice.decay = decay_per_frame(TONE_DECAY_SECS, sample_rate);
        }
        voice
    }

    fn new(source: Source, params: &TriggerParams, sample_rate: f32, delay: usize) -> Self {
        let release = params.overrides.release.unwrap_or(DEFAULT_RELEASE_SECS);
        Self {
            source,
            gain: params.velocity.clamp(0.0, 1.0),
            pan: params.overrides.pan.unwrap_or(0.0),
            active: true,
            delay,
            gate: params.sustain.map(|s| (s.max(0.0) * sample_rate as f64) as usize),
            releasing: false,
            decay: decay_per_frame(release, sample_rate),
        }
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        let skip = self.delay.min(out.len());
        self.delay -= skip;
        for frame in &mut out[skip..] {
            if !self.active {
                break;
            }
            let Some(x) = self.next_sample() else {
                self.active = false;
                break;
            };
            *frame += StereoFrame::panned(x, self.pan).scaled(self.gain);

            match self.gate.as_mut() {
                Some(0) => {
                    self.gate = None;
                    self.releasing = true;
                }
                Some(left) => *left -= 1,
                None => {}
            }
            if self.releasing {
                self.gain *= self.decay;
                if self.gain < SILENCE {
                    self.active = false;
                }
            }
        }
    }

    // mono read of the source; None once a sample runs out
    fn next_sample(&mut self) -> Option<f32> {
        match &mut self.source {
            Source::Sample { buffer, pos, rate } => {
                if *pos >= buffer.len() as f32 {
                    return None;
                }
                let f = buffer.read(*pos);
                *pos += *rate;
                Some((f.left + f.right) * 0.5)
            }
            Source::Tone { phase, phase_inc } => {
                let x = phase.sin();
                *phase = (*phase + *phase_inc) % std::f32::consts::TAU;
                Some(x)
            }
        }
    }
}

// per-frame multiplier that falls ~60dB over `secs`
fn decay_per_frame(secs: f32, sample_rate: f32) -> f32 {
    let frames = (secs.max(0.001) * sample_rate).max(1.0);
    0.001_f32.powf(1.0 / frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delayed_voice_starts_on_its_frame() {
        let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::mono(1.0); 8] });
        let mut voice = Voice::sample(buffer, &TriggerParams::at(0.0), 48000.0, 3);
        let mut out = [StereoFrame::zero(); 6];
        voice.render_into(&mut out);
        assert!(out[..3].iter().all(|f| *f == StereoFrame::zero()));
        assert!(out[3].left > 0.0 && out[5].right > 0.0);
    }

    #[test]
    fn sample_voice_ends_with_its_buffer() {
        let buffer = Arc::new(SampleBuffer { data: vec![StereoFrame::mono(0.5); 4] });
        let mut voice = Voice::sample(buffer, &TriggerParams::at(0.0), 48000.0, 0);
        let mut out = [StereoFrame::zero(); 8];
        voice.render_into(&mut out);
        assert!(!voice.active);
        assert_eq!(out[6], StereoFrame::zero());
    }

    #[test]
    fn tone_rings_out() {
        let mut voice = Voice::tone(&TriggerParams::at(0.0), 48000.0, 0);
        let mut out = vec![StereoFrame::zero(); 48000];
        voice.render_into(&mut out);
        assert!(!voice.active);
    }
}
