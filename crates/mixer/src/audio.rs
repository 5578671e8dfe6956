//! Windowed multi-source audio mixer.
//!
//! Every tick mixes the window `[at - epoch, at - epoch + frame)`. Sources
//! are mapped onto that timeline by an offset fixed the first time each
//! source delivers: `mixer_pts + 2 * frame - sample_pts`, so a new source
//! gets two frames of headroom. A fixed output delay is added on top and
//! subtracted again from the emitted `pts`.
//!
//! A source whose samples stop covering the window (while it still had
//! something to play) underruns: the gap is recorded and the source's
//! offset is dropped, so its next delivery rejoins as if it were new.

use std::collections::{BTreeMap, VecDeque};

use glam::{Mat3, Vec2, Vec3};
use livemix_common::{MixerDefaults, RationalTime, StatsReport, StatsSnapshot};
use livemix_scene_model::{AudioFormat, AudioOutput, AudioSample, MediaConstituent};

use crate::error::MixerError;

/// Static parameters of an audio mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMixerConfig {
    /// Asset id stamped on output; input carrying it is ignored.
    pub id: String,
    pub workspace_id: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub format: AudioFormat,
    /// Tick length in samples.
    pub frame_samples: i64,
    /// Fixed output latency in samples.
    pub delay_samples: i64,
}

impl AudioMixerConfig {
    pub fn from_output(output: &AudioOutput, defaults: &MixerDefaults) -> Result<Self, MixerError> {
        let format = defaults
            .audio_format
            .parse::<AudioFormat>()
            .map_err(|e| MixerError::format_mismatch(e.to_string()))?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: String::new(),
            sample_rate: output.sample_rate,
            channels: output.channels,
            format,
            frame_samples: defaults.audio_frame_samples.max(1),
            delay_samples: defaults.audio_delay_samples.max(0),
        })
    }

    pub fn frame_duration(&self) -> RationalTime {
        RationalTime::new(self.frame_samples, self.sample_rate.max(1) as i64)
    }

    pub fn delay(&self) -> RationalTime {
        RationalTime::new(self.delay_samples, self.sample_rate.max(1) as i64)
    }
}

#[derive(Debug, Default)]
struct SourceQueue {
    samples: VecDeque<AudioSample>,
    offset: Option<RationalTime>,
}

#[derive(Debug)]
pub struct AudioMixer {
    config: AudioMixerConfig,
    frame: RationalTime,
    delay: RationalTime,
    epoch: RationalTime,
    /// Start of the most recent window.
    pts: RationalTime,
    sources: BTreeMap<String, SourceQueue>,
    stats: StatsReport,
}

/// Cubic Hermite step between `edge0` and `edge1`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Pan position and gain encoded in a sound transform.
pub fn sample_position(transform: &Mat3) -> (Vec2, f32) {
    let center = *transform * Vec3::new(0.0, 0.0, 1.0);
    let front = *transform * Vec3::new(0.0, 1.0, 1.0);
    (center.truncate(), (front - center).truncate().length())
}

/// Gain of each output channel for a source at `position` with `magnitude`.
///
/// Stereo channels sit at `x = -1` and `x = 1`. More channels sit evenly on
/// the unit circle, starting half a step past the positive x axis.
pub fn channel_gains(position: Vec2, magnitude: f32, channels: u32) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => vec![magnitude],
        2 => [-1.0f32, 1.0]
            .iter()
            .map(|ideal| smoothstep(0.0, 0.5, 1.0 - (ideal - position.x).abs() * 0.5) * magnitude)
            .collect(),
        n => {
            let theta = std::f32::consts::TAU / n as f32;
            (0..n)
                .map(|i| {
                    let angle = theta * i as f32 + theta / 2.0;
                    let ideal = Vec2::new(angle.cos(), angle.sin());
                    let distance = (ideal - position).length() * 0.5;
                    smoothstep(0.0, 0.5, 1.0 - distance) * magnitude
                })
                .collect()
        }
    }
}

impl AudioMixer {
    /// A mixer whose timeline starts at `epoch`; `now` seeds the offset of
    /// sources that arrive before the first tick.
    pub fn new(config: AudioMixerConfig, epoch: RationalTime, now: RationalTime) -> Self {
        let frame = config.frame_duration();
        let delay = config.delay();
        Self {
            config,
            frame,
            delay,
            epoch,
            pts: now - epoch,
            sources: BTreeMap::new(),
            stats: StatsReport::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &AudioMixerConfig {
        &self.config
    }

    pub fn frame_duration(&self) -> RationalTime {
        self.frame
    }

    pub fn stats(&self) -> &StatsReport {
        &self.stats
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Offset currently applied to `source_id`, if it has joined.
    pub fn source_offset(&self, source_id: &str) -> Option<RationalTime> {
        self.sources.get(source_id).and_then(|q| q.offset)
    }

    /// Queue a sample. Returns `false` when it was ignored.
    pub fn push(&mut self, sample: AudioSample) -> bool {
        if sample.asset_id == self.config.id {
            return false;
        }
        if sample.sample_rate != self.config.sample_rate {
            self.stats.increment("mix.audio.rejected");
            tracing::debug!(
                mixer = %self.config.id,
                source = %sample.source_id,
                rate = sample.sample_rate,
                expected = self.config.sample_rate,
                "Dropping audio sample at foreign rate"
            );
            return false;
        }
        let queue = self.sources.entry(sample.source_id.clone()).or_default();
        if queue.offset.is_none() {
            queue.offset = Some(self.pts + self.frame * 2 - sample.pts);
        }
        queue.samples.push_back(sample);
        true
    }

    pub fn remove_source(&mut self, source_id: &str) {
        self.sources.remove(source_id);
    }

    /// Forget a source's offset; its next sample rejoins as new.
    pub fn discontinuity(&mut self, source_id: &str) {
        if let Some(queue) = self.sources.get_mut(source_id) {
            queue.offset = None;
        }
    }

    /// Mix the window starting at `at - epoch`.
    pub fn mix(&mut self, at: RationalTime) -> AudioSample {
        let window_start = at - self.epoch;
        let window_end = window_start + self.frame;
        self.pts = window_start;
        self.stats.increment("mix.audio.ticks");
        self.stats.end_timer("mix.audio.delta", at);
        self.stats.start_timer("mix.audio.delta", at);

        let channels = self.config.channels as usize;
        let frame_len = self.config.frame_samples.max(0) as usize;
        let mut acc = vec![vec![0.0f64; frame_len]; channels];
        let mut constituents = Vec::new();

        for (source_id, queue) in self.sources.iter_mut() {
            let Some(offset) = queue.offset else {
                continue;
            };
            if queue.samples.is_empty() {
                continue;
            }
            let shift = offset + self.delay;
            let mut covered: Option<(RationalTime, RationalTime)> = None;
            let mut mixed = 0usize;
            let mut late = 0usize;
            let mut retained = VecDeque::with_capacity(queue.samples.len());

            for sample in queue.samples.drain(..) {
                let start = sample.pts + shift;
                let end = start + sample.duration();
                if end <= window_start {
                    late += 1;
                    continue;
                }
                if start >= window_end {
                    retained.push_back(sample);
                    continue;
                }
                let (position, magnitude) = sample_position(&sample.transform);
                let gains = channel_gains(position, magnitude, self.config.channels);
                mix_into(&mut acc, &sample, start - window_start, self.config.sample_rate, &gains);
                mixed += 1;

                let lo = start.max(window_start);
                let hi = end.min(window_end);
                covered = Some(match covered {
                    Some((a, b)) => (a.min(lo), b.max(hi)),
                    None => (lo, hi),
                });
                if end > window_end {
                    retained.push_back(sample);
                }
            }
            queue.samples = retained;

            if late > 0 {
                self.stats.record("mix.audio.late", late as f64);
            }
            if let Some((lo, hi)) = covered {
                constituents.push(MediaConstituent {
                    source_id: source_id.clone(),
                    pts: lo - shift,
                    duration: hi - lo,
                    normalized_pts: lo,
                });
            }

            let complete = matches!(covered, Some((lo, hi)) if lo == window_start && hi == window_end);
            if (mixed > 0 || late > 0) && !complete {
                let gap = match covered {
                    Some((lo, hi)) => (lo - window_start) + (window_end - hi),
                    None => self.frame,
                };
                self.stats.record("mix.audio.underrun", gap.seconds());
                tracing::debug!(
                    mixer = %self.config.id,
                    source = %source_id,
                    gap = %gap,
                    "Audio underrun, resyncing source"
                );
                queue.offset = None;
            }
        }

        let mut out = AudioSample::from_planes(
            &acc,
            self.config.sample_rate,
            self.config.format,
            window_start - self.delay,
            self.config.id.clone(),
        );
        out.time = at;
        out.workspace_id = self.config.workspace_id.clone();
        out.constituents = constituents;
        out
    }
}

/// Add `sample` into `acc`, placed `delta` after the window start.
fn mix_into(acc: &mut [Vec<f64>], sample: &AudioSample, delta: RationalTime, rate: u32, gains: &[f32]) {
    let rate = rate as i64;
    let (out_start, in_start) = if delta.is_positive() {
        (delta.rescale(rate).value.max(0) as usize, 0)
    } else {
        (0, (-delta).rescale(rate).value.max(0) as usize)
    };
    let planes = sample.to_planes();
    if planes.is_empty() {
        return;
    }
    for (ch, out) in acc.iter_mut().enumerate() {
        let plane = &planes[ch % planes.len()];
        let gain = gains.get(ch).copied().unwrap_or(0.0) as f64;
        let count = out
            .len()
            .saturating_sub(out_start)
            .min(plane.len().saturating_sub(in_start));
        for i in 0..count {
            out[out_start + i] += plane[in_start + i] * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> AudioMixerConfig {
        AudioMixerConfig {
            id: "mixer".into(),
            workspace_id: "ws".into(),
            sample_rate: 48_000,
            channels: 2,
            format: AudioFormat::F32p,
            frame_samples: 960,
            delay_samples: 1920,
        }
    }

    fn tone(source: &str, pts_samples: i64, value: f64) -> AudioSample {
        let mut s = AudioSample::from_planes(
            &[vec![value; 960], vec![value; 960]],
            48_000,
            AudioFormat::F32p,
            RationalTime::new(pts_samples, 48_000),
            source,
        );
        s.source_id = source.to_string();
        s
    }

    fn tick(n: i64) -> RationalTime {
        RationalTime::new(960 * n, 48_000)
    }

    #[test]
    fn test_first_push_sets_two_frame_offset() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        mixer.push(tone("a", 4800, 0.5));
        assert_eq!(mixer.source_offset("a"), Some(RationalTime::new(1920 - 4800, 48_000)));
    }

    #[test]
    fn test_own_output_is_ignored() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        assert!(!mixer.push(tone("mixer", 0, 0.5)));
        assert!(mixer.source_offset("mixer").is_none());
    }

    #[test]
    fn test_foreign_rate_rejected() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        let mut s = tone("a", 0, 0.5);
        s.sample_rate = 44_100;
        assert!(!mixer.push(s));
        assert_eq!(mixer.stats().count("mix.audio.rejected"), 1);
    }

    #[test]
    fn test_sample_lands_after_join_and_delay() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        mixer.push(tone("a", 0, 0.5));
        // offset 2 frames + delay 2 frames: window 4 holds the sample.
        for n in 1..4 {
            let out = mixer.mix(tick(n));
            assert!(out.to_planes()[0].iter().all(|&v| v == 0.0));
            assert!(out.constituents.is_empty());
        }
        let out = mixer.mix(tick(4));
        assert_eq!(out.pts, tick(2));
        assert_eq!(out.time, tick(4));
        assert!(out.to_planes()[1].iter().all(|&v| v == 0.5));
        assert_eq!(out.constituents.len(), 1);
        assert_eq!(out.constituents[0].pts, RationalTime::zero(48_000));
        assert_eq!(out.constituents[0].duration, tick(1));
        assert_eq!(mixer.stats().count("mix.audio.underrun"), 0);
    }

    #[test]
    fn test_missing_next_sample_underruns_and_resyncs() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        // Half a frame only.
        let mut s = tone("a", 0, 0.5);
        s.sample_count = 480;
        for b in &mut s.buffers {
            b.truncate(480 * 4);
        }
        mixer.push(s);
        for n in 1..=4 {
            mixer.mix(tick(n));
        }
        assert_eq!(mixer.stats().count("mix.audio.underrun"), 1);
        assert!(mixer.source_offset("a").is_none());
    }

    #[test]
    fn test_late_samples_are_dropped() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        mixer.push(tone("a", 960 * 10, 0.5));
        // A sample from well before the join point.
        mixer.push(tone("a", 0, 0.5));
        mixer.mix(tick(1));
        assert_eq!(mixer.stats().count("mix.audio.late"), 1);
    }

    #[test]
    fn test_overlapping_sources_sum_and_clip() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        mixer.push(tone("a", 0, 0.75));
        mixer.push(tone("b", 0, 0.75));
        let out = (1..=4).map(|n| mixer.mix(tick(n))).last().unwrap();
        assert!(out.to_planes()[0].iter().all(|&v| v == 1.0));
        assert_eq!(out.constituents.len(), 2);
    }

    #[test]
    fn test_remove_and_discontinuity() {
        let mut mixer = AudioMixer::new(config(), RationalTime::zero(48_000), RationalTime::zero(48_000));
        mixer.push(tone("a", 0, 0.5));
        mixer.discontinuity("a");
        assert!(mixer.source_offset("a").is_none());
        mixer.push(tone("a", 960, 0.5));
        assert!(mixer.source_offset("a").is_some());
        mixer.remove_source("a");
        assert!(mixer.source_offset("a").is_none());
    }

    #[test]
    fn test_mono_and_surround_gains() {
        assert_eq!(channel_gains(Vec2::ZERO, 0.5, 1), vec![0.5]);
        let centered = channel_gains(Vec2::ZERO, 1.0, 4);
        assert_eq!(centered.len(), 4);
        assert!(centered.iter().all(|g| (g - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_sample_position_reads_translation_and_scale() {
        let m = Mat3::from_translation(Vec2::new(0.5, -0.25)) * Mat3::from_scale(Vec2::splat(0.8));
        let (pos, mag) = sample_position(&m);
        assert_eq!(pos, Vec2::new(0.5, -0.25));
        assert!((mag - 0.8).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_stereo_gain_at_ideal_position(mag in 0.0f32..4.0, right in any::<bool>()) {
            let x = if right { 1.0 } else { -1.0 };
            let gains = channel_gains(Vec2::new(x, 0.0), mag, 2);
            let (near, far) = if right { (gains[1], gains[0]) } else { (gains[0], gains[1]) };
            prop_assert!((near - mag).abs() <= 1e-6);
            prop_assert_eq!(far, 0.0);
        }
    }
}
