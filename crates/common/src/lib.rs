//! Livemix Common Utilities
//!
//! Shared infrastructure for all livemix crates:
//! - Exact rational timestamps (`RationalTime`)
//! - Clock abstraction with wall-clock and step-driven realizations
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Configuration loading
//! - Lightweight per-component statistics

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod stats;
pub mod time;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use stats::*;
pub use time::*;
