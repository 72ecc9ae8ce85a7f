use std::path::Path;

use anyhow::Context;

use super::frame::StereoFrame;

#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // the audio data array, at the output rate
}

impl SampleBuffer {
    // Load a WAV file from disk, resampled to the output rate
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader // float, just pass it through
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => { // int, convert to float
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let frames: Vec<StereoFrame> = match spec.channels {
            0 => anyhow::bail!("{} has no channels", path.display()),
            1 => samples.into_iter().map(StereoFrame::mono).collect(), // mono, duplicate
            n => samples // keep the first two, drop the rest
                .chunks_exact(n as usize)
                .map(|c| StereoFrame { left: c[0], right: c[1] })
                .collect(),
        };

        Ok(Self { data: resample_linear(&frames, spec.sample_rate, target_rate) })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // fractional read, clamped to the last frame
    pub fn read(&self, pos: f32) -> StereoFrame {
        let i = pos.max(0.0) as usize;
        let Some(&a) = self.data.get(i) else {
            return StereoFrame::zero();
        };
        let b = self.data.get(i + 1).copied().unwrap_or(a);
        StereoFrame::lerp(a, b, pos - i as f32)
    }
}

// plain linear resampler; good enough for one-shot drum hits
fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || frames.is_empty() || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio; // ex. 3.7
            let idx = src_pos.floor() as usize; // ex. 3
            let frac = (src_pos - idx as f64) as f32; // ex. 0.7
            match (frames.get(idx), frames.get(idx + 1)) {
                (Some(&a), Some(&b)) => StereoFrame::lerp(a, b, frac),
                _ => frames[frames.len() - 1],
            }
        })
        .collect()
}
