//! One tokio task per mixer.
//!
//! Every interaction with a running mixer goes through its message
//! channel, so the mixer state never needs a lock. Ticks come from the
//! shared [`Clock`]: each tick schedules the next one before mixing, which
//! keeps the cadence fixed even when a tick fails or runs long.
//!
//! [`Clock`]: livemix_common::Clock

use std::sync::Arc;

use livemix_common::{RationalTime, SharedClock, StatsSnapshot};
use livemix_scene_model::{AudioSample, PictureSample};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::audio::AudioMixer;
use crate::error::{MixerError, TickError};
use crate::picture::PictureMixer;

/// A mixer the driver can run.
pub trait TickMixer: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn id(&self) -> &str;

    fn frame_duration(&self) -> RationalTime;

    fn push(&mut self, input: Self::Input) -> Result<(), MixerError>;

    fn remove_source(&mut self, source_id: &str);

    fn discontinuity(&mut self, _source_id: &str) {}

    fn tick(&mut self, at: RationalTime) -> Result<Self::Output, TickError>;

    fn stats(&self) -> StatsSnapshot;
}

impl TickMixer for AudioMixer {
    type Input = AudioSample;
    type Output = AudioSample;

    fn id(&self) -> &str {
        AudioMixer::id(self)
    }

    fn frame_duration(&self) -> RationalTime {
        AudioMixer::frame_duration(self)
    }

    fn push(&mut self, input: AudioSample) -> Result<(), MixerError> {
        // Ignored samples are counted by the mixer itself.
        AudioMixer::push(self, input);
        Ok(())
    }

    fn remove_source(&mut self, source_id: &str) {
        AudioMixer::remove_source(self, source_id)
    }

    fn discontinuity(&mut self, source_id: &str) {
        AudioMixer::discontinuity(self, source_id)
    }

    fn tick(&mut self, at: RationalTime) -> Result<AudioSample, TickError> {
        Ok(self.mix(at))
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats_snapshot()
    }
}

impl TickMixer for PictureMixer {
    type Input = PictureSample;
    type Output = PictureSample;

    fn id(&self) -> &str {
        PictureMixer::id(self)
    }

    fn frame_duration(&self) -> RationalTime {
        self.config().frame_duration
    }

    fn push(&mut self, input: PictureSample) -> Result<(), MixerError> {
        PictureMixer::push(self, input)
    }

    fn remove_source(&mut self, source_id: &str) {
        PictureMixer::remove_source(self, source_id)
    }

    fn tick(&mut self, at: RationalTime) -> Result<PictureSample, TickError> {
        PictureMixer::tick(self, at)
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats_snapshot()
    }
}

/// Messages accepted by a running mixer.
#[derive(Debug)]
pub enum MixerMessage<I> {
    Sample(I),
    RemoveSource(String),
    Discontinuity(String),
    Tick(RationalTime),
    Stats(oneshot::Sender<StatsSnapshot>),
    Shutdown,
}

/// Cloneable sender side of a running mixer.
#[derive(Debug)]
pub struct MixerHandle<I> {
    id: Arc<str>,
    tx: mpsc::UnboundedSender<MixerMessage<I>>,
}

impl<I> Clone for MixerHandle<I> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<I> MixerHandle<I> {
    /// A handle plus the receiving end its messages land on, for callers
    /// that run the mixer loop themselves.
    pub fn channel(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<MixerMessage<I>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id: String = id.into();
        (Self { id: id.into(), tx }, rx)
    }

    /// Asset id the mixer stamps on its output.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, message: MixerMessage<I>) -> Result<(), MixerError> {
        self.tx.send(message).map_err(|_| MixerError::Closed {
            mixer_id: self.id.to_string(),
        })
    }

    pub fn push(&self, sample: I) -> Result<(), MixerError> {
        self.send(MixerMessage::Sample(sample))
    }

    pub fn remove_source(&self, source_id: impl Into<String>) -> Result<(), MixerError> {
        self.send(MixerMessage::RemoveSource(source_id.into()))
    }

    pub fn discontinuity(&self, source_id: impl Into<String>) -> Result<(), MixerError> {
        self.send(MixerMessage::Discontinuity(source_id.into()))
    }

    pub async fn stats(&self) -> Result<StatsSnapshot, MixerError> {
        let (reply, rx) = oneshot::channel();
        self.send(MixerMessage::Stats(reply))?;
        rx.await.map_err(|_| MixerError::Closed {
            mixer_id: self.id.to_string(),
        })
    }

    /// Stop the mixer after the messages already queued.
    pub fn shutdown(&self) -> Result<(), MixerError> {
        self.send(MixerMessage::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn schedule_tick<I: Send + 'static>(
    clock: &SharedClock,
    at: RationalTime,
    tx: mpsc::WeakUnboundedSender<MixerMessage<I>>,
) {
    clock.schedule(
        at,
        Box::new(move |_now| {
            // The mixer is gone once every handle is dropped.
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(MixerMessage::Tick(at));
            }
        }),
    );
}

/// Run `mixer` on its own task, ticking every frame from the clock's now.
///
/// Output goes to `output`; the task ends on [`MixerMessage::Shutdown`],
/// when every handle is dropped, or when `output` is closed.
pub fn spawn_mixer<M: TickMixer>(
    mut mixer: M,
    clock: SharedClock,
    output: mpsc::UnboundedSender<M::Output>,
) -> (MixerHandle<M::Input>, JoinHandle<()>) {
    let (handle, mut rx) = MixerHandle::channel(mixer.id());
    let id = handle.id.clone();
    let frame = mixer.frame_duration();
    let weak = handle.tx.downgrade();

    schedule_tick(&clock, clock.now() + frame, weak.clone());

    let task = tokio::spawn(async move {
        tracing::info!(mixer = %id, frame = %frame, "Mixer started");
        while let Some(message) = rx.recv().await {
            match message {
                MixerMessage::Sample(sample) => {
                    if let Err(e) = mixer.push(sample) {
                        tracing::warn!(mixer = %id, error = %e, "Failed to accept sample");
                    }
                }
                MixerMessage::RemoveSource(source_id) => mixer.remove_source(&source_id),
                MixerMessage::Discontinuity(source_id) => mixer.discontinuity(&source_id),
                MixerMessage::Tick(at) => {
                    schedule_tick(&clock, at + frame, weak.clone());
                    match mixer.tick(at) {
                        Ok(out) => {
                            if output.send(out).is_err() {
                                tracing::debug!(mixer = %id, "Output receiver dropped");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(mixer = %id, at = %at, error = %e, "Mixer tick failed");
                        }
                    }
                }
                MixerMessage::Stats(reply) => {
                    let _ = reply.send(mixer.stats());
                }
                MixerMessage::Shutdown => break,
            }
        }
        tracing::info!(mixer = %id, "Mixer stopped");
    });

    (handle, task)
}
