//! Transition state machine shared by the picture and sound animators.
//!
//! At most one transition is pending. Starting another one (or assigning a
//! state immediately) supersedes it: the generation counter moves on, the
//! old completion resolves as [`TransitionOutcome::Superseded`], and the
//! clock callback that was already scheduled becomes a no-op when it fires.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use glam::Mat4;
use livemix_common::{RationalTime, SharedClock};
use livemix_scene_model::DeclaredState;
use tokio::sync::oneshot;

use crate::error::AnimatorError;
use crate::interpolate::interpolate_state;

/// How a transition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The target became the current state.
    Completed,
    /// A later `set_state` replaced the target before it was reached.
    Superseded,
    /// The animator was dropped (or its clock discarded the callback).
    Abandoned,
}

/// Observable phase of an animator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatorPhase {
    Unset,
    Steady,
    Transitioning,
}

/// Completion of a `set_state` call.
///
/// Resolves immediately for zero-duration assignments. Dropping it does not
/// cancel the transition.
#[derive(Debug)]
pub struct Transition {
    inner: TransitionInner,
}

#[derive(Debug)]
enum TransitionInner {
    Ready(Option<TransitionOutcome>),
    Pending(oneshot::Receiver<TransitionOutcome>),
}

impl Transition {
    pub(crate) fn ready(outcome: TransitionOutcome) -> Self {
        Self {
            inner: TransitionInner::Ready(Some(outcome)),
        }
    }

    fn pending(rx: oneshot::Receiver<TransitionOutcome>) -> Self {
        Self {
            inner: TransitionInner::Pending(rx),
        }
    }
}

impl Future for Transition {
    type Output = TransitionOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            TransitionInner::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(TransitionOutcome::Completed))
            }
            TransitionInner::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(TransitionOutcome::Abandoned),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Mutable animator state behind the handle's mutex.
#[derive(Debug, Default)]
pub(crate) struct AnimationState {
    pub current: Option<DeclaredState>,
    pub next: Option<DeclaredState>,
    pub start: Option<RationalTime>,
    pub duration: Option<RationalTime>,
    pub generation: u64,
    /// Parent placement seen when this state was first rendered.
    pub initial_parent: Option<Mat4>,
    waiter: Option<oneshot::Sender<TransitionOutcome>>,
}

pub(crate) type SharedState = Arc<Mutex<AnimationState>>;

pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, AnimationState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AnimationState {
    pub fn phase(&self) -> AnimatorPhase {
        match (&self.current, &self.next) {
            (None, _) => AnimatorPhase::Unset,
            (Some(_), Some(_)) => AnimatorPhase::Transitioning,
            (Some(_), None) => AnimatorPhase::Steady,
        }
    }

    /// Drop any pending transition, resolving its completion as superseded.
    fn supersede(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.next = None;
        self.start = None;
        self.duration = None;
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(TransitionOutcome::Superseded);
        }
    }

    /// Promote the pending target to current.
    fn complete(&mut self) {
        if let Some(next) = self.next.take() {
            self.current = Some(next);
        }
        self.start = None;
        self.duration = None;
        self.initial_parent = None;
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(TransitionOutcome::Completed);
        }
    }

    /// The state to render at `now`.
    ///
    /// While transitioning, numeric fields are interpolated by the elapsed
    /// fraction of the duration. The fraction is not clamped, so a late
    /// completion callback lets it run past 1.
    pub fn resolved(&self, now: RationalTime) -> Result<DeclaredState, AnimatorError> {
        let current = self.current.as_ref().ok_or(AnimatorError::NoCurrentState)?;
        match (&self.next, self.start, self.duration) {
            (Some(next), Some(start), Some(duration)) => {
                let total = duration.seconds();
                if total <= 0.0 {
                    return Ok(current.clone());
                }
                let pct = ((now - start).seconds() / total) as f32;
                Ok(interpolate_state(current, next, pct))
            }
            _ => Ok(current.clone()),
        }
    }
}

/// Start a transition to `target` over `duration`.
///
/// An unset animator, or a non-positive duration, assigns immediately.
pub(crate) fn set_state(
    shared: &SharedState,
    clock: &SharedClock,
    target: DeclaredState,
    duration: RationalTime,
) -> Transition {
    let mut state = lock(shared);
    if state.current.is_none() || !duration.is_positive() {
        state.supersede();
        state.current = Some(target);
        state.initial_parent = None;
        return Transition::ready(TransitionOutcome::Completed);
    }

    state.supersede();
    let now = clock.now();
    let generation = state.generation;
    let (tx, rx) = oneshot::channel();
    state.next = Some(target);
    state.start = Some(now);
    state.duration = Some(duration);
    state.waiter = Some(tx);
    drop(state);

    let weak = Arc::downgrade(shared);
    clock.schedule(
        now + duration,
        Box::new(move |_| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut state = lock(&shared);
            if state.generation == generation {
                state.complete();
            }
        }),
    );
    Transition::pending(rx)
}
