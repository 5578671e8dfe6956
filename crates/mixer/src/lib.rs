//! Livemix Mixer
//!
//! Periodic mixers that merge many independently timed sources into one
//! fixed-cadence output:
//! - **Audio:** windowed mixing with per-source offsets and spatial gain
//! - **Picture:** z-ordered compositing through a [`ComputeContext`]
//! - **Conversion:** per-source audio rate/channel/format adaptation
//! - **Driver:** one tokio task per mixer, ticks scheduled on a [`Clock`]
//!
//! [`Clock`]: livemix_common::Clock
//!
//! # Tick cadence
//!
//! ```text
//! clock ── Tick(at) ──▶ driver ── schedule(at + frame) ──▶ clock
//!                         │
//!                         ├── mixer.tick(at)
//!                         ▼
//!                       output (pts = at - epoch [- delay])
//! ```

pub mod audio;
pub mod backing;
pub mod compute;
pub mod convert;
pub mod cpu;
pub mod driver;
pub mod error;
pub mod picture;

pub use audio::{AudioMixer, AudioMixerConfig};
pub use backing::BackingRing;
pub use compute::{ComputeContext, ImageUniforms, KernelId, KernelRegistry};
pub use convert::AudioConverter;
pub use cpu::CpuCompute;
pub use driver::{spawn_mixer, MixerHandle, MixerMessage, TickMixer};
pub use error::{MixerError, TickError};
pub use picture::{PictureMixer, PictureMixerConfig};
