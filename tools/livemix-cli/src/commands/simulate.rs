//! Run a manifest offline on a step clock with synthetic sources.
//!
//! Every bound asset feeds a solid-colour picture and a sine tone each frame.
//! After each frame the command prints what the mixers emitted.

use std::path::PathBuf;
use std::sync::Arc;

use livemix_common::{EngineConfig, RationalTime, SharedClock, StatsSnapshot, StepClock};
use livemix_composer::ComposerRuntime;
use livemix_mixer::CpuCompute;
use livemix_scene_model::{
    AudioFormat, AudioSample, Manifest, PictureBuffer, PictureData, PictureSample, PixelFormat,
};

const PALETTE: [[u8; 4]; 6] = [
    [220, 60, 60, 255],
    [60, 180, 90, 255],
    [60, 110, 220, 255],
    [230, 200, 60, 255],
    [170, 80, 200, 255],
    [60, 200, 200, 255],
];

const TONE_HZ: f64 = 440.0;
const TONE_AMPLITUDE: f64 = 0.25;

/// Parse `asset=element`.
pub fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((asset, element)) if !asset.is_empty() && !element.is_empty() => {
            Ok((asset.to_string(), element.to_string()))
        }
        _ => Err(format!("expected asset=element, got '{s}'")),
    }
}

struct Source {
    asset: String,
    color: [u8; 4],
    /// Tone frequency, spread per asset so mixes are distinguishable.
    hz: f64,
}

impl Source {
    fn picture(&self, pts: RationalTime) -> PictureSample {
        let data = PictureData::solid(PixelFormat::Rgba, 16, 16, self.color);
        PictureSample::new(
            PictureBuffer::Cpu(Arc::new(data)),
            16,
            16,
            PixelFormat::Rgba,
            pts,
            self.asset.clone(),
        )
    }

    fn tone(&self, first: i64, count: usize, rate: u32, channels: u32) -> AudioSample {
        let plane: Vec<f64> = (0..count as i64)
            .map(|i| {
                let t = (first + i) as f64 / rate as f64;
                TONE_AMPLITUDE * (std::f64::consts::TAU * self.hz * t).sin()
            })
            .collect();
        let planes = vec![plane; channels as usize];
        AudioSample::from_planes(
            &planes,
            rate,
            AudioFormat::F32p,
            RationalTime::new(first, rate as i64),
            self.asset.clone(),
        )
    }
}

pub async fn run(
    path: PathBuf,
    config: &EngineConfig,
    ticks: u32,
    bindings: Vec<(String, String)>,
    switch_to: Option<String>,
) -> anyhow::Result<()> {
    let manifest =
        Manifest::load(&path).map_err(|e| anyhow::anyhow!("Failed to load manifest: {e}"))?;
    let frame = manifest.video.frame_duration;
    let rate = manifest.audio.sample_rate;
    let channels = manifest.audio.channels;
    let samples_per_frame = (rate as i64 * frame.value / frame.scale).max(1);

    let clock = Arc::new(StepClock::new(frame));
    let shared: SharedClock = clock.clone();
    let mut runtime = ComposerRuntime::start(
        manifest,
        shared,
        Some(Box::new(CpuCompute::new())),
        config,
    )?;
    let handle = runtime.handle().clone();
    tracing::info!(path = %path.display(), ticks, frame = %frame, "Simulating manifest");

    let mut sources = Vec::new();
    for (i, (asset, element)) in bindings.into_iter().enumerate() {
        handle.bind(asset.clone(), element.clone()).await?;
        println!("Bound {asset} -> {element}");
        if sources.iter().any(|s: &Source| s.asset == asset) {
            continue;
        }
        sources.push(Source {
            asset,
            color: PALETTE[i % PALETTE.len()],
            hz: TONE_HZ * (1.0 + i as f64 / 4.0),
        });
    }
    println!();

    for n in 0..ticks {
        if n == ticks / 2 {
            if let Some(scene) = &switch_to {
                handle.set_scene(scene.clone()).await?;
                println!("Switched to scene '{scene}'");
            }
        }

        let first = n as i64 * samples_per_frame;
        let pts = RationalTime::new(n as i64 * frame.value, frame.scale);
        for source in &sources {
            handle.push(source.picture(pts))?;
            handle.push(source.tone(first, samples_per_frame as usize, rate, channels))?;
        }
        // Routed samples reach the mixer queues ahead of the next tick.
        handle.snapshot().await?;
        let now = clock.advance();
        // Ticks fired by the advance are queued ahead of these requests.
        runtime.audio_mixer().stats().await?;
        runtime.picture_mixer().stats().await?;

        let mut line = format!("[{now}]");
        while let Ok(picture) = runtime.picture_output().try_recv() {
            line.push_str(&format!(
                " picture pts={} layers={}",
                picture.pts,
                picture.constituents.len()
            ));
        }
        while let Ok(audio) = runtime.audio_output().try_recv() {
            line.push_str(&format!(
                " audio pts={} sources={}",
                audio.pts,
                audio.constituents.len()
            ));
        }
        println!("{line}");
    }

    println!();
    print_stats("Composer", &handle.stats().await?);
    print_stats("Audio mixer", &runtime.audio_mixer().stats().await?);
    print_stats("Picture mixer", &runtime.picture_mixer().stats().await?);

    runtime.shutdown().await;
    Ok(())
}

fn print_stats(title: &str, stats: &StatsSnapshot) {
    println!("{title}:");
    if stats.is_empty() {
        println!("  (none)");
    }
    for (key, summary) in stats {
        println!(
            "  {key}: count={} mean={:.3} min={:.3} max={:.3}",
            summary.count,
            summary.mean(),
            summary.min,
            summary.max
        );
    }
}
