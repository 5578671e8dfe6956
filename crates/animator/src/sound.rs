//! Sound animator: pan position and gain of an element's audio.
//!
//! A sound transform is a 2D homogeneous matrix on the unit audio plane.
//! Its translation is the perceived position and its scale is the gain, so
//! nesting elements multiplies gains and offsets positions.

use std::sync::Arc;

use glam::{Mat3, Vec2};
use livemix_common::{RationalTime, SharedClock};
use livemix_scene_model::{AudioSample, DeclaredState};

use crate::error::AnimatorError;
use crate::transition::{self, lock, AnimatorPhase, SharedState, Transition};

#[derive(Clone)]
pub struct SoundAnimator {
    clock: SharedClock,
    revision: Arc<str>,
    state: SharedState,
}

impl std::fmt::Debug for SoundAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundAnimator")
            .field("revision", &self.revision)
            .field("phase", &self.phase())
            .finish()
    }
}

impl SoundAnimator {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            revision: uuid::Uuid::new_v4().to_string().into(),
            state: SharedState::default(),
        }
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn set_state(&self, target: DeclaredState, duration: RationalTime) -> Transition {
        tracing::trace!(revision = %self.revision, duration = %duration, "sound set_state");
        transition::set_state(&self.state, &self.clock, target, duration)
    }

    pub fn phase(&self) -> AnimatorPhase {
        lock(&self.state).phase()
    }

    pub fn current_state(&self) -> Option<DeclaredState> {
        lock(&self.state).current.clone()
    }

    /// Effective transform at the clock's current time, composed under `parent`.
    pub fn computed_matrix(&self, parent: Option<&Mat3>) -> Result<Mat3, AnimatorError> {
        let now = self.clock.now();
        let resolved = lock(&self.state).resolved(now)?;
        let own = own_matrix(&resolved);
        Ok(match parent {
            Some(parent) => *parent * own,
            None => own,
        })
    }

    /// Attach this element's transform to `sample`, or suppress it.
    ///
    /// Returns `None` while the element is unset or muted.
    pub fn apply(&self, sample: AudioSample, parent: Option<&Mat3>) -> Option<AudioSample> {
        let muted = lock(&self.state)
            .current
            .as_ref()
            .map(|s| s.muted)
            .unwrap_or(true);
        if muted {
            return None;
        }
        let effective = self.computed_matrix(parent).ok()?;
        Some(AudioSample {
            transform: sample.transform * effective,
            source_id: self.revision.to_string(),
            ..sample
        })
    }
}

fn own_matrix(state: &DeclaredState) -> Mat3 {
    Mat3::from_translation(state.audio_pos) * Mat3::from_scale(Vec2::splat(state.audio_gain))
}
