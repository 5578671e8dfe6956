//! Z-ordered picture compositor.
//!
//! The mixer keeps the latest sample of every source and redraws all of
//! them each tick into the next image of a [`BackingRing`], so sources need
//! not match the output cadence. A source that stops delivering is dropped
//! after `hold_ticks` ticks without a fresh sample (zero keeps it until it
//! is removed).

use std::collections::BTreeMap;

use livemix_common::{MixerDefaults, RationalTime, StatsReport, StatsSnapshot};
use livemix_scene_model::{
    ImageHandle, MediaConstituent, PictureBuffer, PictureSample, PixelFormat, VideoOutput,
};

use crate::backing::BackingRing;
use crate::compute::{ComputeContext, ImageUniforms, KernelRegistry};
use crate::error::{MixerError, TickError};

/// Static parameters of a picture mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureMixerConfig {
    pub id: String,
    pub workspace_id: String,
    pub frame_duration: RationalTime,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub ring_capacity: usize,
    pub hold_ticks: u32,
}

impl PictureMixerConfig {
    pub fn from_output(output: &VideoOutput, defaults: &MixerDefaults) -> Result<Self, MixerError> {
        let format = defaults
            .picture_format
            .parse::<PixelFormat>()
            .map_err(|e| MixerError::format_mismatch(e.to_string()))?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: String::new(),
            frame_duration: output.frame_duration,
            width: output.width,
            height: output.height,
            format,
            ring_capacity: defaults.backing_ring_capacity,
            hold_ticks: defaults.picture_hold_ticks,
        })
    }
}

#[derive(Debug)]
struct HeldPicture {
    sample: PictureSample,
    /// Image this mixer uploaded for a CPU sample; released on replacement.
    uploaded: Option<ImageHandle>,
    age: u32,
}

pub struct PictureMixer {
    config: PictureMixerConfig,
    epoch: RationalTime,
    compute: Option<Box<dyn ComputeContext>>,
    kernels: KernelRegistry,
    ring: BackingRing,
    sources: BTreeMap<String, HeldPicture>,
    stats: StatsReport,
}

impl std::fmt::Debug for PictureMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PictureMixer")
            .field("id", &self.config.id)
            .field("compute", &self.compute.as_ref().map(|c| c.name().to_string()))
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl PictureMixer {
    pub fn new(
        config: PictureMixerConfig,
        compute: Option<Box<dyn ComputeContext>>,
        epoch: RationalTime,
    ) -> Self {
        let ring = BackingRing::new(config.ring_capacity, config.format, config.width, config.height);
        Self {
            config,
            epoch,
            compute,
            kernels: KernelRegistry::default(),
            ring,
            sources: BTreeMap::new(),
            stats: StatsReport::new(),
        }
    }

    /// Replace the kernel registry.
    pub fn with_kernels(mut self, kernels: KernelRegistry) -> Self {
        self.kernels = kernels;
        self
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &PictureMixerConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsReport {
        &self.stats
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Keep `sample` as its source's latest picture, uploading CPU buffers.
    pub fn push(&mut self, mut sample: PictureSample) -> Result<(), MixerError> {
        if sample.asset_id == self.config.id {
            return Ok(());
        }
        let ctx = self.compute.as_mut().ok_or(MixerError::NoComputeContext)?;
        let uploaded = match &sample.buffer {
            PictureBuffer::Cpu(data) => {
                let handle = ctx.upload(data, sample.format, sample.width, sample.height)?;
                sample.buffer = PictureBuffer::Gpu(handle);
                Some(handle)
            }
            PictureBuffer::Gpu(_) => None,
        };
        let held = HeldPicture {
            sample,
            uploaded,
            age: 0,
        };
        if let Some(old) = self.sources.insert(held.sample.source_id.clone(), held) {
            if let Some(handle) = old.uploaded {
                ctx.release(handle);
            }
        }
        Ok(())
    }

    pub fn remove_source(&mut self, source_id: &str) {
        if let Some(old) = self.sources.remove(source_id) {
            self.release_upload(old.uploaded);
        }
    }

    fn release_upload(&mut self, handle: Option<ImageHandle>) {
        if let (Some(handle), Some(ctx)) = (handle, self.compute.as_mut()) {
            ctx.release(handle);
        }
    }

    /// Composite every held source into a fresh backing image.
    pub fn tick(&mut self, at: RationalTime) -> Result<PictureSample, TickError> {
        let pts = at - self.epoch;
        self.stats.increment("mix.video.ticks");
        self.stats.end_timer("mix.video.delta", at);
        self.stats.start_timer("mix.video.delta", at);

        let result = self.compose();
        self.age_sources();

        match result {
            Ok((target, constituents)) => {
                let mut out = PictureSample::new(
                    PictureBuffer::Gpu(target),
                    self.config.width,
                    self.config.height,
                    self.config.format,
                    pts,
                    self.config.id.clone(),
                );
                out.time = at;
                out.workspace_id = self.config.workspace_id.clone();
                out.constituents = constituents
                    .into_iter()
                    .map(|(source_id, source_pts)| MediaConstituent {
                        source_id,
                        pts: source_pts,
                        duration: self.config.frame_duration,
                        normalized_pts: pts,
                    })
                    .collect();
                Ok(out)
            }
            Err((asset_id, source)) => {
                self.stats.increment("mix.video.errors");
                Err(TickError {
                    mixer_id: self.config.id.clone(),
                    asset_id,
                    at,
                    source,
                })
            }
        }
    }

    fn compose(&mut self) -> Tagged<(ImageHandle, Vec<(String, RationalTime)>)> {
        let ctx = self
            .compute
            .as_deref_mut()
            .ok_or((None, MixerError::NoComputeContext))?;
        let target = self.ring.acquire(ctx).map_err(untagged)?;

        let mut draws: Vec<&PictureSample> = self.sources.values().map(|h| &h.sample).collect();
        draws.sort_by(|a, b| a.z_index().total_cmp(&b.z_index()));

        ctx.begin_pass().map_err(untagged)?;
        match draw_pass(ctx, &self.kernels, &draws, target, self.config.format) {
            Ok(drawn) => {
                ctx.end_pass(true).map_err(untagged)?;
                Ok((target, drawn))
            }
            Err(err) => {
                let _ = ctx.end_pass(false);
                Err(err)
            }
        }
    }

    fn age_sources(&mut self) {
        if self.config.hold_ticks == 0 {
            return;
        }
        let hold = self.config.hold_ticks;
        let mut expired = Vec::new();
        for (id, held) in self.sources.iter_mut() {
            held.age += 1;
            if held.age >= hold {
                expired.push(id.clone());
            }
        }
        for id in expired {
            self.remove_source(&id);
        }
    }

    /// Free uploaded pictures and backing images.
    pub fn release_all(&mut self) {
        let uploads: Vec<_> = std::mem::take(&mut self.sources)
            .into_values()
            .filter_map(|h| h.uploaded)
            .collect();
        if let Some(ctx) = self.compute.as_deref_mut() {
            for handle in uploads {
                ctx.release(handle);
            }
            self.ring.release_all(ctx);
        }
    }
}

impl Drop for PictureMixer {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// A failure tagged with the asset being drawn, if any.
type Tagged<T> = Result<T, (Option<String>, MixerError)>;

fn untagged(err: MixerError) -> (Option<String>, MixerError) {
    (None, err)
}

/// Clear `target`, then draw `draws` in order.
fn draw_pass(
    ctx: &mut dyn ComputeContext,
    kernels: &KernelRegistry,
    draws: &[&PictureSample],
    target: ImageHandle,
    format: PixelFormat,
) -> Tagged<Vec<(String, RationalTime)>> {
    let clear = kernels.lookup(None, format).map_err(untagged)?;
    ctx.clear(target, &clear).map_err(untagged)?;

    let mut drawn = Vec::with_capacity(draws.len());
    for sample in draws {
        let tag = |e| (Some(sample.asset_id.clone()), e);
        let kernel = kernels.lookup(Some(sample.format), format).map_err(tag)?;
        let PictureBuffer::Gpu(source) = &sample.buffer else {
            return Err(tag(MixerError::compute("picture was never uploaded")));
        };
        ctx.composite(*source, target, &kernel, &ImageUniforms::from_sample(sample))
            .map_err(tag)?;
        drawn.push((sample.source_id.clone(), sample.pts));
    }
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuCompute;
    use glam::{Mat4, Vec3, Vec4};
    use livemix_scene_model::PictureData;
    use std::sync::Arc;

    fn config(format: PixelFormat, hold_ticks: u32) -> PictureMixerConfig {
        PictureMixerConfig {
            id: "video".into(),
            workspace_id: "ws".into(),
            frame_duration: RationalTime::new(1, 30),
            width: 4,
            height: 4,
            format,
            ring_capacity: 3,
            hold_ticks,
        }
    }

    fn solid(source: &str, rgba: [u8; 4], z: f32) -> PictureSample {
        let data = PictureData::solid(PixelFormat::Rgba, 2, 2, rgba);
        let mut s = PictureSample::new(
            PictureBuffer::Cpu(Arc::new(data)),
            2,
            2,
            PixelFormat::Rgba,
            RationalTime::zero(30),
            source,
        );
        let m = Mat4::from_translation(Vec3::new(-1.0, -1.0, z)) * Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));
        s.matrix = m;
        s.border_matrix = m;
        s
    }

    #[test]
    fn test_no_compute_context_fails_each_tick() {
        let mut mixer = PictureMixer::new(config(PixelFormat::Rgba, 2), None, RationalTime::zero(30));
        assert_eq!(mixer.push(solid("a", [255; 4], 0.0)), Err(MixerError::NoComputeContext));
        let err = mixer.tick(RationalTime::new(1, 30)).unwrap_err();
        assert_eq!(err.source, MixerError::NoComputeContext);
        assert!(mixer.tick(RationalTime::new(2, 30)).is_err());
        assert_eq!(mixer.stats().count("mix.video.errors"), 2);
        assert_eq!(mixer.stats().count("mix.video.ticks"), 2);
    }

    #[test]
    fn test_output_pts_follows_tick() {
        let ctx = CpuCompute::new();
        let mut mixer =
            PictureMixer::new(config(PixelFormat::Rgba, 2), Some(Box::new(ctx)), RationalTime::new(1, 30));
        let out = mixer.tick(RationalTime::new(4, 30)).unwrap();
        assert_eq!(out.pts, RationalTime::new(3, 30));
        assert_eq!(out.time, RationalTime::new(4, 30));
        assert_eq!(out.asset_id, "video");
        assert!(out.constituents.is_empty());
    }

    #[test]
    fn test_upload_replaced_and_released() {
        let ctx = CpuCompute::new();
        let mut mixer = PictureMixer::new(config(PixelFormat::Rgba, 2), Some(Box::new(ctx.clone())), RationalTime::zero(30));
        mixer.push(solid("a", [255, 0, 0, 255], 0.0)).unwrap();
        mixer.push(solid("a", [0, 255, 0, 255], 0.0)).unwrap();
        assert_eq!(ctx.image_count(), 1);
        mixer.remove_source("a");
        assert_eq!(ctx.image_count(), 0);
    }

    #[test]
    fn test_stale_source_expires_after_hold() {
        let ctx = CpuCompute::new();
        let mut mixer = PictureMixer::new(config(PixelFormat::Rgba, 2), Some(Box::new(ctx.clone())), RationalTime::zero(30));
        mixer.push(solid("a", [255, 0, 0, 255], 0.0)).unwrap();
        let first = mixer.tick(RationalTime::new(1, 30)).unwrap();
        assert_eq!(first.constituents.len(), 1);
        let second = mixer.tick(RationalTime::new(2, 30)).unwrap();
        assert_eq!(second.constituents.len(), 1);
        let third = mixer.tick(RationalTime::new(3, 30)).unwrap();
        assert!(third.constituents.is_empty());
        let PictureBuffer::Gpu(img) = third.buffer else { panic!("expected image") };
        assert_eq!(ctx.pixel(img, 1, 1).unwrap(), Vec4::ZERO);
    }

    #[test]
    fn test_zero_hold_keeps_repeating() {
        let ctx = CpuCompute::new();
        let mut mixer = PictureMixer::new(config(PixelFormat::Rgba, 0), Some(Box::new(ctx)), RationalTime::zero(30));
        mixer.push(solid("a", [255, 0, 0, 255], 0.0)).unwrap();
        for n in 1..=5 {
            assert_eq!(mixer.tick(RationalTime::new(n, 30)).unwrap().constituents.len(), 1);
        }
    }

    #[test]
    fn test_missing_kernel_is_tagged_with_asset() {
        let ctx = CpuCompute::new();
        let mut mixer = PictureMixer::new(config(PixelFormat::Nv12, 2), Some(Box::new(ctx.clone())), RationalTime::zero(30));
        let mut s = solid("a", [255, 0, 0, 255], 0.0);
        s.buffer = PictureBuffer::Cpu(Arc::new(PictureData::solid(PixelFormat::Bgra, 2, 2, [0, 0, 255, 255])));
        s.format = PixelFormat::Bgra;
        mixer.push(s).unwrap();
        // bgra -> nv12 exists by default; leave it out to force a lookup failure.
        let mut kernels = KernelRegistry::empty();
        for name in KernelRegistry::default().names().filter(|n| *n != "img_bgra_nv12") {
            kernels.register(name);
        }
        let mut mixer = mixer.with_kernels(kernels);
        let err = mixer.tick(RationalTime::new(1, 30)).unwrap_err();
        assert_eq!(err.asset_id.as_deref(), Some("a"));
        assert_eq!(
            err.source,
            MixerError::KernelNotFound { input: Some(PixelFormat::Bgra), target: PixelFormat::Nv12 }
        );
        // The pass was closed, so the next tick can run.
        mixer.remove_source("a");
        assert!(mixer.tick(RationalTime::new(2, 30)).is_ok());
        assert_eq!(ctx.pass_count(), 2);
    }
}
