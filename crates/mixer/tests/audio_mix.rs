use std::sync::Arc;

use livemix_common::{Clock, RationalTime, StepClock};
use livemix_mixer::{spawn_mixer, AudioConverter, AudioMixer, AudioMixerConfig};
use livemix_scene_model::{AudioFormat, AudioSample};
use tokio::sync::mpsc;

const RATE: u32 = 48_000;
const FRAME: i64 = 480;

fn config() -> AudioMixerConfig {
    AudioMixerConfig {
        id: "program-audio".into(),
        workspace_id: "ws".into(),
        sample_rate: RATE,
        channels: 2,
        format: AudioFormat::F32p,
        frame_samples: FRAME,
        delay_samples: 0,
    }
}

fn frame(n: i64) -> RationalTime {
    RationalTime::new(FRAME * n, RATE as i64)
}

fn tone(source: &str, rate: u32, len: usize, n: i64, value: f64) -> AudioSample {
    let mut s = AudioSample::from_planes(
        &[vec![value; len], vec![value; len]],
        rate,
        AudioFormat::F32p,
        RationalTime::new(len as i64 * n, rate as i64),
        source,
    );
    s.source_id = format!("{source}-rev");
    s
}

#[tokio::test]
async fn continuous_source_plays_without_gaps() {
    let clock = Arc::new(StepClock::new(frame(1)));
    let mixer = AudioMixer::new(config(), clock.now(), clock.now());
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn_mixer(mixer, clock.clone(), out_tx);

    for n in 0..8 {
        handle.push(tone("mic", RATE, FRAME as usize, n, 0.5)).unwrap();
        clock.advance();
        let out = out_rx.recv().await.unwrap();
        assert_eq!(out.pts, frame(n + 1));
        assert_eq!(out.sample_count, FRAME as usize);
        if n == 0 {
            // Two frames of join headroom: nothing is due yet.
            assert!(out.constituents.is_empty());
            assert!(out.to_planes()[0].iter().all(|&v| v == 0.0));
        } else {
            assert_eq!(out.constituents.len(), 1);
            assert_eq!(out.constituents[0].source_id, "mic-rev");
            assert_eq!(out.constituents[0].pts, frame(n - 1));
            assert!(out.to_planes().iter().flatten().all(|&v| v == 0.5));
        }
    }

    let stats = handle.stats().await.unwrap();
    assert!(!stats.contains_key("mix.audio.underrun"));
    assert_eq!(stats["mix.audio.ticks"].count, 8);
}

#[tokio::test]
async fn full_scale_source_survives_default_delay_and_s16_output() {
    const DEFAULT_FRAME: i64 = 960;
    let step = RationalTime::new(DEFAULT_FRAME, RATE as i64);
    let config = AudioMixerConfig {
        format: AudioFormat::S16i,
        frame_samples: DEFAULT_FRAME,
        delay_samples: 1920,
        ..config()
    };
    let clock = Arc::new(StepClock::new(step));
    let mixer = AudioMixer::new(config, clock.now(), clock.now());
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn_mixer(mixer, clock.clone(), out_tx);

    // +1.0 clips to i16::MAX on the way out.
    let full_scale = 32_767.0 / 32_768.0;
    let mut last_pts = None;
    for n in 0..10 {
        handle
            .push(tone("mic", RATE, DEFAULT_FRAME as usize, n, 1.0))
            .unwrap();
        clock.advance();
        let out = out_rx.recv().await.unwrap();
        assert_eq!(out.format, AudioFormat::S16i);
        assert_eq!(out.sample_count, DEFAULT_FRAME as usize);
        if let Some(prev) = last_pts {
            assert_eq!(out.pts - prev, step);
        }
        last_pts = Some(out.pts);

        let planes = out.to_planes();
        if n < 3 {
            // Two frames of join headroom plus two of output delay.
            assert!(planes.iter().flatten().all(|&v| v == 0.0));
        } else {
            assert_eq!(out.constituents.len(), 1);
            assert!(planes
                .iter()
                .flatten()
                .all(|&v| (v - full_scale).abs() < 1e-9));
        }
    }

    let stats = handle.stats().await.unwrap();
    assert!(!stats.contains_key("mix.audio.underrun"));
    assert!(!stats.contains_key("mix.audio.late"));
    assert_eq!(stats["mix.audio.ticks"].count, 10);
}

#[tokio::test]
async fn converted_source_mixes_with_native_one() {
    let clock = Arc::new(StepClock::new(frame(1)));
    let mixer = AudioMixer::new(config(), clock.now(), clock.now());
    let converter = AudioConverter::new(RATE, 2, AudioFormat::F32p);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn_mixer(mixer, clock.clone(), out_tx);

    let mut last = None;
    for n in 0..4 {
        handle.push(tone("a", RATE, FRAME as usize, n, 0.25)).unwrap();
        let foreign = tone("b", 44_100, 441, n, 0.25);
        handle.push(converter.convert(foreign)).unwrap();
        clock.advance();
        last = out_rx.recv().await;
    }

    let out = last.unwrap();
    assert_eq!(out.constituents.len(), 2);
    assert!(out.to_planes().iter().flatten().all(|&v| v == 0.5));
    let stats = handle.stats().await.unwrap();
    assert!(!stats.contains_key("mix.audio.rejected"));
}

#[tokio::test]
async fn unconverted_foreign_rate_is_rejected() {
    let clock = Arc::new(StepClock::new(frame(1)));
    let mixer = AudioMixer::new(config(), clock.now(), clock.now());
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (handle, _task) = spawn_mixer(mixer, clock.clone(), out_tx);

    handle.push(tone("b", 44_100, 441, 0, 0.25)).unwrap();
    clock.advance();
    let out = out_rx.recv().await.unwrap();
    assert!(out.constituents.is_empty());
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats["mix.audio.rejected"].count, 1);
}
