//! Composer task, its handle, and the runtime that wires it to the mixers.

use std::sync::Arc;

use livemix_animator::{ComputedPictureState, TransitionOutcome};
use livemix_common::{EngineConfig, LivemixResult, RationalTime, SharedClock, StatsSnapshot};
use livemix_mixer::{
    spawn_mixer, AudioConverter, AudioMixer, AudioMixerConfig, ComputeContext, MixerHandle,
    PictureMixer, PictureMixerConfig,
};
use livemix_scene_model::{AudioSample, ComposerCommand, Manifest, MediaSample, PictureSample};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::command::{run_command, ActionHandler, Continuations, NoActions};
use crate::composer::{ComposerSnapshot, SceneComposer, StateCompletion};
use crate::error::ComposerError;

type Reply<T> = oneshot::Sender<Result<T, ComposerError>>;

/// Messages accepted by the composer task.
pub enum ComposerMessage {
    Sample(MediaSample),
    Bind {
        asset: String,
        element: String,
        reply: Reply<()>,
    },
    Unbind {
        element: String,
        reply: Reply<()>,
    },
    SetScene {
        scene: String,
        reply: Reply<()>,
    },
    SetState {
        element: String,
        state: String,
        duration: RationalTime,
        reply: Reply<StateCompletion>,
    },
    RunCommand {
        command: ComposerCommand,
        reply: Option<Reply<()>>,
    },
    ComputedPicture {
        element: String,
        reply: Reply<ComputedPictureState>,
    },
    Snapshot(oneshot::Sender<ComposerSnapshot>),
    Stats(oneshot::Sender<StatsSnapshot>),
    Shutdown,
}

/// Cloneable sender side of the composer task.
#[derive(Debug, Clone)]
pub struct ComposerHandle {
    tx: mpsc::UnboundedSender<ComposerMessage>,
}

impl ComposerHandle {
    fn send(&self, message: ComposerMessage) -> Result<(), ComposerError> {
        self.tx.send(message).map_err(|_| ComposerError::Closed)
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(Reply<T>) -> ComposerMessage,
    ) -> Result<T, ComposerError> {
        let (reply, rx) = oneshot::channel();
        self.send(message(reply))?;
        rx.await.map_err(|_| ComposerError::Closed)?
    }

    /// Hand a live sample to the composer for routing.
    pub fn push(&self, sample: impl Into<MediaSample>) -> Result<(), ComposerError> {
        self.send(ComposerMessage::Sample(sample.into()))
    }

    pub async fn bind(
        &self,
        asset: impl Into<String>,
        element: impl Into<String>,
    ) -> Result<(), ComposerError> {
        let (asset, element) = (asset.into(), element.into());
        self.request(|reply| ComposerMessage::Bind {
            asset,
            element,
            reply,
        })
        .await
    }

    pub async fn unbind(&self, element: impl Into<String>) -> Result<(), ComposerError> {
        let element = element.into();
        self.request(|reply| ComposerMessage::Unbind { element, reply })
            .await
    }

    pub async fn set_scene(&self, scene: impl Into<String>) -> Result<(), ComposerError> {
        let scene = scene.into();
        self.request(|reply| ComposerMessage::SetScene { scene, reply })
            .await
    }

    /// Start a transition. The returned future resolves once both of the
    /// element's animators have finished (or been superseded).
    pub async fn set_state(
        &self,
        element: impl Into<String>,
        state: impl Into<String>,
        duration: RationalTime,
    ) -> Result<StateCompletion, ComposerError> {
        let (element, state) = (element.into(), state.into());
        self.request(|reply| ComposerMessage::SetState {
            element,
            state,
            duration,
            reply,
        })
        .await
    }

    /// [`set_state`](Self::set_state), then wait for the transition.
    pub async fn transition(
        &self,
        element: impl Into<String>,
        state: impl Into<String>,
        duration: RationalTime,
    ) -> Result<TransitionOutcome, ComposerError> {
        Ok(self.set_state(element, state, duration).await?.await)
    }

    /// Run a command tree. Returns once the root node has run; deferred
    /// continuations keep running on the composer.
    pub async fn run_command(&self, command: ComposerCommand) -> Result<(), ComposerError> {
        self.request(|reply| ComposerMessage::RunCommand {
            command,
            reply: Some(reply),
        })
        .await
    }

    pub async fn computed_picture(
        &self,
        element: impl Into<String>,
    ) -> Result<ComputedPictureState, ComposerError> {
        let element = element.into();
        self.request(|reply| ComposerMessage::ComputedPicture { element, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<ComposerSnapshot, ComposerError> {
        let (reply, rx) = oneshot::channel();
        self.send(ComposerMessage::Snapshot(reply))?;
        rx.await.map_err(|_| ComposerError::Closed)
    }

    pub async fn stats(&self) -> Result<StatsSnapshot, ComposerError> {
        let (reply, rx) = oneshot::channel();
        self.send(ComposerMessage::Stats(reply))?;
        rx.await.map_err(|_| ComposerError::Closed)
    }

    pub fn shutdown(&self) -> Result<(), ComposerError> {
        self.send(ComposerMessage::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Re-enters deferred continuations through the composer's own channel.
#[derive(Clone)]
struct Requeue(mpsc::WeakUnboundedSender<ComposerMessage>);

impl Continuations for Requeue {
    fn schedule(&self, after: Vec<ComposerCommand>) {
        let Some(tx) = self.0.upgrade() else {
            return;
        };
        for command in after {
            let _ = tx.send(ComposerMessage::RunCommand {
                command,
                reply: None,
            });
        }
    }
}

/// Run `composer` on its own task.
pub fn spawn_composer(
    mut composer: SceneComposer,
    actions: Arc<dyn ActionHandler>,
) -> (ComposerHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let requeue = Requeue(tx.downgrade());
    let handle = ComposerHandle { tx };

    let task = tokio::spawn(async move {
        tracing::info!(scene = %composer.current_scene(), "Composer started");
        while let Some(message) = rx.recv().await {
            match message {
                ComposerMessage::Sample(sample) => composer.route(sample),
                ComposerMessage::Bind {
                    asset,
                    element,
                    reply,
                } => {
                    let _ = reply.send(composer.bind(&asset, &element));
                }
                ComposerMessage::Unbind { element, reply } => {
                    let _ = reply.send(composer.unbind(&element));
                }
                ComposerMessage::SetScene { scene, reply } => {
                    let _ = reply.send(composer.set_scene(&scene));
                }
                ComposerMessage::SetState {
                    element,
                    state,
                    duration,
                    reply,
                } => {
                    let _ = reply.send(composer.set_state(&element, &state, duration));
                }
                ComposerMessage::RunCommand { command, reply } => {
                    let result = run_command(&mut composer, command, &actions, &requeue);
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                tracing::warn!(error = %e, "Deferred command failed");
                            }
                        }
                    }
                }
                ComposerMessage::ComputedPicture { element, reply } => {
                    let _ = reply.send(composer.computed_picture(&element));
                }
                ComposerMessage::Snapshot(reply) => {
                    let _ = reply.send(composer.snapshot());
                }
                ComposerMessage::Stats(reply) => {
                    let _ = reply.send(composer.stats_snapshot());
                }
                ComposerMessage::Shutdown => break,
            }
        }
        tracing::info!("Composer stopped");
    });

    (handle, task)
}

/// Both mixers and the composer, running.
pub struct ComposerRuntime {
    handle: ComposerHandle,
    audio_mixer: MixerHandle<AudioSample>,
    picture_mixer: MixerHandle<PictureSample>,
    audio_output: mpsc::UnboundedReceiver<AudioSample>,
    picture_output: mpsc::UnboundedReceiver<PictureSample>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for ComposerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposerRuntime")
            .field("audio_mixer", &self.audio_mixer.id())
            .field("picture_mixer", &self.picture_mixer.id())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl ComposerRuntime {
    /// Validate `manifest` and start the mixers and the composer on `clock`.
    ///
    /// Without a compute context the picture mixer still ticks, but every
    /// tick fails and no pictures are emitted.
    pub fn start(
        manifest: Manifest,
        clock: SharedClock,
        compute: Option<Box<dyn ComputeContext>>,
        config: &EngineConfig,
    ) -> LivemixResult<Self> {
        Self::start_with_actions(manifest, clock, compute, config, Arc::new(NoActions))
    }

    pub fn start_with_actions(
        manifest: Manifest,
        clock: SharedClock,
        compute: Option<Box<dyn ComputeContext>>,
        config: &EngineConfig,
        actions: Arc<dyn ActionHandler>,
    ) -> LivemixResult<Self> {
        manifest.validate()?;
        let workspace_id = uuid::Uuid::new_v4().to_string();
        let epoch = clock.now();

        let mut audio_config = AudioMixerConfig::from_output(&manifest.audio, &config.mixer)?;
        audio_config.workspace_id = workspace_id.clone();
        let converter = AudioConverter::new(
            audio_config.sample_rate,
            audio_config.channels,
            audio_config.format,
        );
        let mut picture_config = PictureMixerConfig::from_output(&manifest.video, &config.mixer)?;
        picture_config.workspace_id = workspace_id.clone();

        if compute.is_none() {
            tracing::warn!("No compute context; picture output is disabled");
        }

        let (audio_tx, audio_output) = mpsc::unbounded_channel();
        let (audio_mixer, audio_task) = spawn_mixer(
            AudioMixer::new(audio_config, epoch, epoch),
            clock.clone(),
            audio_tx,
        );
        let (picture_tx, picture_output) = mpsc::unbounded_channel();
        let (picture_mixer, picture_task) = spawn_mixer(
            PictureMixer::new(picture_config, compute, epoch),
            clock.clone(),
            picture_tx,
        );

        let composer = SceneComposer::new(
            manifest,
            clock,
            audio_mixer.clone(),
            picture_mixer.clone(),
            converter,
        )?;
        let (handle, composer_task) = spawn_composer(composer, actions);

        tracing::info!(
            workspace = %workspace_id,
            audio_mixer = %audio_mixer.id(),
            picture_mixer = %picture_mixer.id(),
            "Runtime started"
        );

        Ok(Self {
            handle,
            audio_mixer,
            picture_mixer,
            audio_output,
            picture_output,
            tasks: vec![audio_task, picture_task, composer_task],
        })
    }

    pub fn handle(&self) -> &ComposerHandle {
        &self.handle
    }

    pub fn audio_mixer(&self) -> &MixerHandle<AudioSample> {
        &self.audio_mixer
    }

    pub fn picture_mixer(&self) -> &MixerHandle<PictureSample> {
        &self.picture_mixer
    }

    /// Mixed audio, one sample per audio tick.
    pub fn audio_output(&mut self) -> &mut mpsc::UnboundedReceiver<AudioSample> {
        &mut self.audio_output
    }

    /// Composited pictures, one per picture tick.
    pub fn picture_output(&mut self) -> &mut mpsc::UnboundedReceiver<PictureSample> {
        &mut self.picture_output
    }

    /// Stop the composer and both mixers and wait for their tasks.
    pub async fn shutdown(self) {
        let _ = self.handle.shutdown();
        let _ = self.audio_mixer.shutdown();
        let _ = self.picture_mixer.shutdown();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Runtime task ended abnormally");
            }
        }
        tracing::info!("Runtime stopped");
    }
}
