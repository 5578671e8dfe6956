//! Audio conversion ahead of the mixer.

use livemix_scene_model::{AudioFormat, AudioSample};

/// Adapts incoming audio to one rate, channel count and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConverter {
    pub sample_rate: u32,
    pub channels: u32,
    pub format: AudioFormat,
}

impl AudioConverter {
    pub fn new(sample_rate: u32, channels: u32, format: AudioFormat) -> Self {
        Self {
            sample_rate,
            channels,
            format,
        }
    }

    pub fn needs_conversion(&self, sample: &AudioSample) -> bool {
        sample.sample_rate != self.sample_rate
            || sample.channels != self.channels
            || sample.format != self.format
    }

    /// Convert `sample`, keeping its timing, identity and transform.
    pub fn convert(&self, sample: AudioSample) -> AudioSample {
        if !self.needs_conversion(&sample) {
            return sample;
        }
        let planes = remix(sample.to_planes(), self.channels as usize);
        let planes = resample(&planes, sample.sample_rate, self.sample_rate);
        let mut out = AudioSample::from_planes(
            &planes,
            self.sample_rate,
            self.format,
            sample.pts,
            sample.asset_id,
        );
        out.channels = self.channels;
        out.time = sample.time;
        out.workspace_id = sample.workspace_id;
        out.source_id = sample.source_id;
        out.transform = sample.transform;
        out.constituents = sample.constituents;
        out
    }
}

/// Map `planes` onto `channels`: average down to mono, duplicate mono,
/// otherwise wrap around the input channels.
fn remix(planes: Vec<Vec<f64>>, channels: usize) -> Vec<Vec<f64>> {
    let inputs = planes.len();
    if inputs == channels || inputs == 0 {
        return planes;
    }
    if channels == 1 {
        let len = planes.iter().map(Vec::len).max().unwrap_or(0);
        let mono = (0..len)
            .map(|i| {
                planes.iter().map(|p| p.get(i).copied().unwrap_or(0.0)).sum::<f64>() / inputs as f64
            })
            .collect();
        return vec![mono];
    }
    (0..channels).map(|ch| planes[ch % inputs].clone()).collect()
}

/// Linear-interpolation resampler. Output length rounds up so consecutive
/// samples leave no gap on the mixer's timeline.
fn resample(planes: &[Vec<f64>], from: u32, to: u32) -> Vec<Vec<f64>> {
    if from == to || from == 0 || to == 0 {
        return planes.to_vec();
    }
    let ratio = from as f64 / to as f64;
    planes
        .iter()
        .map(|plane| {
            if plane.is_empty() {
                return Vec::new();
            }
            let out_len = (plane.len() as u64 * to as u64).div_ceil(from as u64) as usize;
            let last = plane.len() - 1;
            (0..out_len)
                .map(|i| {
                    let pos = i as f64 * ratio;
                    let i0 = (pos.floor() as usize).min(last);
                    let i1 = (i0 + 1).min(last);
                    let frac = pos - i0 as f64;
                    plane[i0] + (plane[i1] - plane[i0]) * frac
                })
                .collect()
        })
        .collect()
}
