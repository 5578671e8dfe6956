//! Livemix Animator
//!
//! Turns declared element states into per-sample transforms:
//! - **Transitions:** `Unset -> Steady -> Transitioning -> Steady`, driven by a clock
//! - **Picture:** position, size, rotation, anchoring, aspect fitting, borders, opacity
//! - **Sound:** pan position and gain on the unit audio plane
//!
//! Animators are cheap handles over shared state. Clones observe and drive
//! the same element, and clock callbacks only hold weak references.

pub mod error;
pub mod interpolate;
pub mod picture;
pub mod sound;
pub mod transition;

pub use error::AnimatorError;
pub use picture::{ComputedPictureState, PictureAnimator};
pub use sound::SoundAnimator;
pub use transition::{AnimatorPhase, Transition, TransitionOutcome};
