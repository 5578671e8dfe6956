//! Scene composer core.
//!
//! [`SceneComposer`] is plain synchronous state: the runtime task owns it and
//! feeds it one message at a time. It tracks which scene is active, which
//! asset feeds which element, and routes every incoming sample through the
//! element's animators (and its ancestors') into the mixers.

use futures::future::BoxFuture;
use futures::FutureExt;
use glam::Mat3;
use livemix_animator::{ComputedPictureState, TransitionOutcome};
use livemix_common::{RationalTime, SharedClock, StatsReport, StatsSnapshot};
use livemix_mixer::{AudioConverter, MixerHandle};
use livemix_scene_model::{AudioSample, DeclaredState, Manifest, MediaSample, PictureSample};
use serde::Serialize;

use crate::arena::{ElementArena, ElementIndex, ElementSlot};
use crate::error::ComposerError;

/// Completion of a composer `set_state`: both animators have finished.
pub type StateCompletion = BoxFuture<'static, TransitionOutcome>;

/// Diagnostic view of one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSnapshot {
    pub id: String,
    pub active: bool,
    pub parent: Option<String>,
    pub asset: Option<String>,
    pub state: Option<DeclaredState>,
    pub states: Vec<String>,
}

/// Diagnostic view of the whole composer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposerSnapshot {
    pub scene: String,
    pub elements: Vec<ElementSnapshot>,
}

impl ComposerSnapshot {
    pub fn element(&self, id: &str) -> Option<&ElementSnapshot> {
        self.elements.iter().find(|e| e.id == id)
    }
}

pub struct SceneComposer {
    manifest: Manifest,
    arena: ElementArena,
    current_scene: String,
    audio: MixerHandle<AudioSample>,
    picture: MixerHandle<PictureSample>,
    converter: AudioConverter,
    stats: StatsReport,
}

impl std::fmt::Debug for SceneComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneComposer")
            .field("scene", &self.current_scene)
            .field("elements", &self.arena.len())
            .field("audio", &self.audio.id())
            .field("picture", &self.picture.id())
            .finish()
    }
}

fn combine(picture: TransitionOutcome, sound: TransitionOutcome) -> TransitionOutcome {
    if picture == TransitionOutcome::Completed {
        sound
    } else {
        picture
    }
}

impl SceneComposer {
    /// One slot per element of any scene, then the initial scene is activated.
    pub fn new(
        manifest: Manifest,
        clock: SharedClock,
        audio: MixerHandle<AudioSample>,
        picture: MixerHandle<PictureSample>,
        converter: AudioConverter,
    ) -> Result<Self, ComposerError> {
        let canvas = glam::Vec2::new(manifest.video.width as f32, manifest.video.height as f32);
        let mut arena = ElementArena::new();
        for id in manifest.element_ids() {
            arena.insert(ElementSlot::new(id, clock.clone(), canvas));
        }
        let initial = manifest.initial_scene.clone();
        let mut composer = Self {
            manifest,
            arena,
            current_scene: String::new(),
            audio,
            picture,
            converter,
            stats: StatsReport::new(),
        };
        composer.set_scene(&initial)?;
        Ok(composer)
    }

    fn index(&self, element: &str) -> Result<ElementIndex, ComposerError> {
        self.arena
            .index_of(element)
            .ok_or_else(|| ComposerError::UnknownElement {
                element: element.to_string(),
            })
    }

    /// Feed `asset_id` into `element`.
    pub fn bind(&mut self, asset_id: &str, element: &str) -> Result<(), ComposerError> {
        let index = self.index(element)?;
        if self.arena[index].asset.as_deref() == Some(asset_id) {
            return Ok(());
        }
        if self.arena[index].is_connected() {
            self.disconnect(index);
        }
        self.arena[index].asset = Some(asset_id.to_string());
        tracing::info!(asset = %asset_id, element = %element, "Bound asset");
        if self.arena[index].active {
            self.apply_initial_state(index);
        }
        Ok(())
    }

    /// Detach whatever asset feeds `element`. States are kept.
    pub fn unbind(&mut self, element: &str) -> Result<(), ComposerError> {
        let index = self.index(element)?;
        let was_connected = self.arena[index].is_connected();
        match self.arena[index].asset.take() {
            Some(asset) => {
                if was_connected {
                    self.disconnect(index);
                }
                tracing::info!(asset = %asset, element = %element, "Unbound asset");
            }
            None => tracing::debug!(element = %element, "Unbind on unbound element"),
        }
        Ok(())
    }

    /// Make `scene_id` the active scene.
    ///
    /// Every element loses its parent and state set first; the ones the new
    /// scene declares get them back from the declaration and snap to their
    /// initial state. Animators and asset bindings survive the switch.
    pub fn set_scene(&mut self, scene_id: &str) -> Result<(), ComposerError> {
        let scene = self
            .manifest
            .scene(scene_id)
            .cloned()
            .ok_or_else(|| ComposerError::UnknownScene {
                scene: scene_id.to_string(),
            })?;

        let mut dropped = Vec::new();
        for (index, slot) in self.arena.iter_mut() {
            let was_connected = slot.is_connected();
            slot.parent = None;
            slot.picture.reset_parent();
            match scene.elements.get(&slot.id) {
                Some(declared) => {
                    slot.states = declared.states.clone();
                    slot.initial_state = declared.initial_state.clone();
                    slot.active = true;
                }
                None => {
                    slot.states.clear();
                    slot.initial_state = None;
                    slot.active = false;
                }
            }
            if was_connected && !slot.is_connected() {
                dropped.push(index);
            }
        }

        for (id, declared) in &scene.elements {
            let (Some(child), Some(parent)) = (
                self.arena.index_of(id),
                declared.parent.as_deref().and_then(|p| self.arena.index_of(p)),
            ) else {
                continue;
            };
            self.arena[child].parent = Some(parent);
        }

        for index in dropped {
            self.disconnect(index);
        }
        for (index, slot) in self.arena.iter() {
            if slot.active {
                self.apply_initial_state(index);
            }
        }

        tracing::info!(
            from = %self.current_scene,
            to = %scene_id,
            elements = scene.elements.len(),
            "Switched scene"
        );
        self.current_scene = scene_id.to_string();
        self.stats.increment("composer.scene_switches");
        Ok(())
    }

    /// Drive `element` toward `state` of the current scene over `duration`.
    pub fn set_state(
        &mut self,
        element: &str,
        state: &str,
        duration: RationalTime,
    ) -> Result<StateCompletion, ComposerError> {
        let index = self.index(element)?;
        let slot = &self.arena[index];
        let target = slot
            .states
            .get(state)
            .cloned()
            .ok_or_else(|| ComposerError::UnknownState {
                element: element.to_string(),
                state: state.to_string(),
                scene: self.current_scene.clone(),
            })?;
        tracing::debug!(element = %element, state = %state, duration = %duration, "Setting element state");
        let picture = slot.picture.set_state(target.clone(), duration);
        let sound = slot.sound.set_state(target, duration);
        Ok(async move {
            let (picture, sound) = futures::join!(picture, sound);
            combine(picture, sound)
        }
        .boxed())
    }

    /// Snap an element to its scene's initial state, if it declares one.
    fn apply_initial_state(&self, index: ElementIndex) {
        let slot = &self.arena[index];
        let Some(initial) = slot.initial_state.as_ref() else {
            return;
        };
        match slot.states.get(initial) {
            Some(state) => {
                let zero = RationalTime::zero(1);
                drop(slot.picture.set_state(state.clone(), zero));
                drop(slot.sound.set_state(state.clone(), zero));
            }
            None => {
                tracing::warn!(element = %slot.id, state = %initial, "Initial state is not declared");
            }
        }
    }

    /// Remove the element's pictures and audio from the mixers.
    fn disconnect(&self, index: ElementIndex) {
        let slot = &self.arena[index];
        if let Err(e) = self.picture.remove_source(slot.picture.revision()) {
            tracing::warn!(element = %slot.id, error = %e, "Failed to detach picture");
        }
        if let Err(e) = self.audio.remove_source(slot.sound.revision()) {
            tracing::warn!(element = %slot.id, error = %e, "Failed to detach audio");
        }
    }

    /// Send a sample through every connected element bound to its asset.
    pub fn route(&mut self, sample: MediaSample) {
        match sample {
            MediaSample::Audio(sample) => self.route_audio(sample),
            MediaSample::Picture(sample) => self.route_picture(sample),
            MediaSample::Coded(sample) => {
                self.stats.increment("composer.coded_ignored");
                tracing::trace!(asset = %sample.asset_id, codec = %sample.codec, "Coded sample not routable");
            }
        }
    }

    fn route_audio(&mut self, sample: AudioSample) {
        let targets = self.arena.connected_to(&sample.asset_id);
        if targets.is_empty() {
            self.stats.increment("composer.unrouted");
            return;
        }
        let sample = self.converter.convert(sample);
        for index in targets {
            let parent = self.sound_parent(index);
            let slot = &self.arena[index];
            let Some(out) = slot.sound.apply(sample.clone(), parent.as_ref()) else {
                self.stats.increment("composer.suppressed");
                continue;
            };
            match self.audio.push(out) {
                Ok(()) => self.stats.increment("composer.routed.audio"),
                Err(e) => tracing::warn!(element = %slot.id, error = %e, "Dropping audio"),
            }
        }
    }

    fn route_picture(&mut self, sample: PictureSample) {
        let targets = self.arena.connected_to(&sample.asset_id);
        if targets.is_empty() {
            self.stats.increment("composer.unrouted");
            return;
        }
        for index in targets {
            self.arena[index].source_size = sample.size();
            let parent = self.picture_parent(index);
            let slot = &self.arena[index];
            let Some(out) = slot.picture.apply(sample.clone(), parent.as_ref()) else {
                self.stats.increment("composer.suppressed");
                continue;
            };
            match self.picture.push(out) {
                Ok(()) => self.stats.increment("composer.routed.picture"),
                Err(e) => tracing::warn!(element = %slot.id, error = %e, "Dropping picture"),
            }
        }
    }

    /// Combined sound transform of `index`'s ancestors. Ancestors without a
    /// state contribute nothing.
    fn sound_parent(&self, index: ElementIndex) -> Option<Mat3> {
        self.arena
            .ancestors(index)
            .into_iter()
            .fold(None, |parent, ancestor| {
                match self.arena[ancestor].sound.computed_matrix(parent.as_ref()) {
                    Ok(matrix) => Some(matrix),
                    Err(_) => parent,
                }
            })
    }

    /// Placement of `index`'s parent, composed down from the outermost ancestor.
    fn picture_parent(&self, index: ElementIndex) -> Option<ComputedPictureState> {
        self.arena
            .ancestors(index)
            .into_iter()
            .fold(None, |parent, ancestor| {
                let slot = &self.arena[ancestor];
                match slot.picture.computed_state(slot.source_size, parent.as_ref()) {
                    Ok(state) => Some(state),
                    Err(_) => parent,
                }
            })
    }

    /// Current placement of `element` under its ancestors, in canvas pixels.
    pub fn computed_picture(&self, element: &str) -> Result<ComputedPictureState, ComposerError> {
        let index = self.index(element)?;
        let parent = self.picture_parent(index);
        let slot = &self.arena[index];
        Ok(slot.picture.computed_state(slot.source_size, parent.as_ref())?)
    }

    pub fn current_scene(&self) -> &str {
        &self.current_scene
    }

    pub fn current_state(&self, element: &str) -> Option<DeclaredState> {
        self.arena.get(element)?.picture.current_state()
    }

    pub fn element_ids(&self) -> Vec<String> {
        self.arena.iter().map(|(_, slot)| slot.id.clone()).collect()
    }

    pub fn parent_of(&self, element: &str) -> Option<&str> {
        let parent = self.arena.get(element)?.parent?;
        Some(self.arena[parent].id.as_str())
    }

    pub fn binding_of(&self, element: &str) -> Option<&str> {
        self.arena.get(element)?.asset.as_deref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn stats(&self) -> &StatsReport {
        &self.stats
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn snapshot(&self) -> ComposerSnapshot {
        let elements = self
            .arena
            .iter()
            .map(|(_, slot)| ElementSnapshot {
                id: slot.id.clone(),
                active: slot.active,
                parent: slot.parent.map(|p| self.arena[p].id.clone()),
                asset: slot.asset.clone(),
                state: slot.picture.current_state(),
                states: slot.states.keys().cloned().collect(),
            })
            .collect();
        ComposerSnapshot {
            scene: self.current_scene.clone(),
            elements,
        }
    }
}
