//! Livemix Scene Model
//!
//! Defines the core data contracts for livemix compositions:
//! - **States:** Declared visual/audio targets an element animates between
//! - **Manifest:** Scenes, elements, parent links, and output parameters
//! - **Samples:** Audio, picture, and coded media passed through the engine
//! - **Commands:** Composer command trees with `after` continuations
//!
//! Picture positions and sizes are in output-canvas pixels with the origin
//! at the top-left corner. Audio positions live on a unit plane where
//! `x = -1` is hard left and `x = 1` is hard right.

pub mod command;
pub mod manifest;
pub mod sample;
pub mod state;

pub use command::*;
pub use manifest::*;
pub use sample::*;
pub use state::*;
