//! Mixer errors.

use livemix_common::{LivemixError, RationalTime};
use livemix_scene_model::{ImageHandle, PixelFormat};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MixerError {
    #[error("no compute context")]
    NoComputeContext,

    #[error("no kernel registered for {}", kernel_name(.input, .target))]
    KernelNotFound {
        input: Option<PixelFormat>,
        target: PixelFormat,
    },

    #[error("image {handle:?} not found")]
    ImageNotFound { handle: ImageHandle },

    #[error("format mismatch: {message}")]
    FormatMismatch { message: String },

    #[error("compute error: {message}")]
    Compute { message: String },

    #[error("mixer {mixer_id} has shut down")]
    Closed { mixer_id: String },
}

impl MixerError {
    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch {
            message: msg.into(),
        }
    }

    pub fn compute(msg: impl Into<String>) -> Self {
        Self::Compute {
            message: msg.into(),
        }
    }
}

/// `img_{input}_{target}`, with `clear` standing in for a missing input.
pub(crate) fn kernel_name(input: &Option<PixelFormat>, target: &PixelFormat) -> String {
    let input = input.map(PixelFormat::name).unwrap_or("clear");
    format!("img_{input}_{}", target.name())
}

fn on_asset(asset_id: &Option<String>) -> String {
    asset_id
        .as_deref()
        .map(|a| format!(" on {a}"))
        .unwrap_or_default()
}

/// A tick that failed; later ticks still run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("mixer {mixer_id} tick at {at} failed{}: {source}", on_asset(.asset_id))]
pub struct TickError {
    pub mixer_id: String,
    /// Source being drawn when the failure happened, if any.
    pub asset_id: Option<String>,
    pub at: RationalTime,
    pub source: MixerError,
}

impl From<MixerError> for LivemixError {
    fn from(err: MixerError) -> Self {
        match err {
            MixerError::Compute { .. } | MixerError::NoComputeContext => {
                LivemixError::compute(err.to_string())
            }
            _ => LivemixError::mixer(err.to_string()),
        }
    }
}

impl From<TickError> for LivemixError {
    fn from(err: TickError) -> Self {
        LivemixError::mixer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_not_found_names_kernel() {
        let err = MixerError::KernelNotFound {
            input: Some(PixelFormat::Nv12),
            target: PixelFormat::Y420p,
        };
        assert_eq!(err.to_string(), "no kernel registered for img_nv12_y420p");
        let clear = MixerError::KernelNotFound {
            input: None,
            target: PixelFormat::Rgba,
        };
        assert!(clear.to_string().ends_with("img_clear_rgba"));
    }

    #[test]
    fn test_tick_error_mentions_asset() {
        let err = TickError {
            mixer_id: "video".into(),
            asset_id: Some("cam".into()),
            at: RationalTime::new(1, 30),
            source: MixerError::NoComputeContext,
        };
        let text = err.to_string();
        assert!(text.contains("video"));
        assert!(text.contains("on cam"));
        let top: LivemixError = err.into();
        assert!(matches!(top, LivemixError::Mixer { .. }));
    }
}
