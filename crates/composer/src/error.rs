//! Composer errors.

use livemix_animator::AnimatorError;
use livemix_common::LivemixError;
use livemix_mixer::MixerError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComposerError {
    #[error("unknown scene '{scene}'")]
    UnknownScene { scene: String },

    #[error("unknown element '{element}'")]
    UnknownElement { element: String },

    #[error("scene '{scene}' declares no state '{state}' for element '{element}'")]
    UnknownState {
        element: String,
        state: String,
        scene: String,
    },

    #[error("action '{name}' failed: {message}")]
    Action { name: String, message: String },

    #[error(transparent)]
    Animator(#[from] AnimatorError),

    #[error(transparent)]
    Mixer(#[from] MixerError),

    #[error("composer has shut down")]
    Closed,
}

impl ComposerError {
    pub fn action(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Action {
            name: name.into(),
            message: msg.into(),
        }
    }
}

impl From<ComposerError> for LivemixError {
    fn from(err: ComposerError) -> Self {
        match err {
            ComposerError::Animator(e) => e.into(),
            ComposerError::Mixer(e) => e.into(),
            ComposerError::Action { .. } => LivemixError::unsupported(err.to_string()),
            _ => LivemixError::scene(err.to_string()),
        }
    }
}
