//! Animator errors.

use livemix_common::LivemixError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AnimatorError {
    /// Queried before any state was set.
    #[error("animator has no current state")]
    NoCurrentState,
}

impl From<AnimatorError> for LivemixError {
    fn from(err: AnimatorError) -> Self {
        LivemixError::animator(err.to_string())
    }
}
