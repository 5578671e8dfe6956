//! Error types shared across livemix crates.

/// Top-level error type for livemix operations.
#[derive(Debug, thiserror::Error)]
pub enum LivemixError {
    #[error("Manifest error: {message}")]
    Manifest { message: String },

    #[error("Scene error: {message}")]
    Scene { message: String },

    #[error("Animator error: {message}")]
    Animator { message: String },

    #[error("Mixer error: {message}")]
    Mixer { message: String },

    #[error("Compute error: {message}")]
    Compute { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using LivemixError.
pub type LivemixResult<T> = Result<T, LivemixError>;

impl LivemixError {
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest {
            message: msg.into(),
        }
    }

    pub fn scene(msg: impl Into<String>) -> Self {
        Self::Scene {
            message: msg.into(),
        }
    }

    pub fn animator(msg: impl Into<String>) -> Self {
        Self::Animator {
            message: msg.into(),
        }
    }

    pub fn mixer(msg: impl Into<String>) -> Self {
        Self::Mixer {
            message: msg.into(),
        }
    }

    pub fn compute(msg: impl Into<String>) -> Self {
        Self::Compute {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
